//! Login page

/// Landing text shown before a wallet is connected
pub fn render_login() -> String {
    let mut out = String::new();
    out.push_str("⚓ Kraken\n");
    out.push_str("Secure Decentralized Messaging\n");
    out.push_str("Web3-Powered Communication\n\n");
    out.push_str("Connect a wallet to continue:\n");
    out.push_str("  kraken login              ask the local wallet for its account\n");
    out.push_str("  kraken login --address 0x…  connect a specific address\n");
    out
}

/// Inline error box for a failed connection attempt
pub fn render_login_error(message: &str) -> String {
    format!("✗ {}\n", message)
}
