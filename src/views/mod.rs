//! View Layer
//!
//! Terminal pages. Each renderer takes already-loaded data and returns the
//! text to print, so pages stay testable without a terminal.

pub mod format;
pub mod home;
pub mod login;
pub mod messages;
pub mod profile;
pub mod search;
pub mod wallet;

use crate::address::WalletAddress;
use std::fmt;

/// Application routes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Home,
    Messages,
    Search,
    Wallet,
    Profile,
}

impl Route {
    /// Routes shown in the navigation bar
    pub const NAV: [Route; 5] = [Route::Home, Route::Messages, Route::Search, Route::Wallet, Route::Profile];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Home => "/",
            Route::Messages => "/messages",
            Route::Search => "/search",
            Route::Wallet => "/wallet",
            Route::Profile => "/profile",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Route::Login => "Login",
            Route::Home => "Home",
            Route::Messages => "Messages",
            Route::Search => "Search",
            Route::Wallet => "Wallet",
            Route::Profile => "Profile",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Route guard
///
/// Signed-out users only ever see `Login`; signed-in users are sent from
/// `Login` to `Home`.
pub fn resolve(requested: Route, authenticated: bool) -> Route {
    match (requested, authenticated) {
        (_, false) => Route::Login,
        (Route::Login, true) => Route::Home,
        (route, true) => route,
    }
}

/// Navigation shell header for signed-in pages
pub fn nav_bar(active: Route, address: &WalletAddress) -> String {
    let items: Vec<String> = Route::NAV
        .iter()
        .map(|route| {
            if *route == active {
                format!("[{}]", route.title())
            } else {
                route.title().to_string()
            }
        })
        .collect();
    format!("⚓ Kraken  {}  ({})\n{}\n", items.join("  "), address.short(), "─".repeat(60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_guard() {
        for route in Route::NAV {
            assert_eq!(resolve(route, false), Route::Login);
            assert_eq!(resolve(route, true), route);
        }
        assert_eq!(resolve(Route::Login, false), Route::Login);
        assert_eq!(resolve(Route::Login, true), Route::Home);
    }

    #[test]
    fn test_nav_bar_marks_active_route() {
        let address = WalletAddress::parse("0x52908400098527886E0F7030069857D2E4169EE7").unwrap();
        let bar = nav_bar(Route::Wallet, &address);
        assert!(bar.contains("[Wallet]"));
        assert!(bar.contains("Messages"));
        assert!(bar.contains("0x5290...9ee7"));
    }
}
