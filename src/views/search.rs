//! Search page

use super::format::truncate;
use crate::address::abbreviate;
use crate::profiles::Profile;

pub fn render_search_results(query: &str, profiles: &[Profile]) -> String {
    if profiles.is_empty() {
        return format!("No profiles match {:?}\n", query);
    }
    let mut out = format!("{} result(s) for {:?}\n", profiles.len(), query);
    for profile in profiles {
        out.push_str(&format!(
            "  {:<20} {}  {}\n",
            truncate(&profile.username, 20),
            abbreviate(&profile.address),
            truncate(&profile.bio, 40)
        ));
    }
    out.push_str("\nMessage someone with `kraken new <address>`\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_results() {
        let profile = Profile {
            address: "0x52908400098527886e0f7030069857d2e4169ee7".into(),
            username: "Satoshi".into(),
            bio: "just a guy".into(),
            avatar_url: String::new(),
            created_at: None,
            updated_at: None,
        };
        let page = render_search_results("sato", &[profile]);
        assert!(page.starts_with("1 result(s) for \"sato\""));
        assert!(page.contains("Satoshi"));
        assert!(page.contains("0x5290...9ee7"));
        assert_eq!(render_search_results("zzz", &[]), "No profiles match \"zzz\"\n");
    }
}
