//! Profile page

use crate::address::abbreviate;
use crate::profiles::Profile;

pub fn render_profile(profile: &Profile) -> String {
    let mut out = format!("{}\n{}\n\n", profile.username, abbreviate(&profile.address));
    if profile.bio.is_empty() {
        out.push_str("No bio yet\n");
    } else {
        out.push_str(&format!("{}\n", profile.bio));
    }
    if !profile.avatar_url.is_empty() {
        out.push_str(&format!("Avatar: {}\n", profile.avatar_url));
    }
    out.push_str("\nEdit with `kraken profile --username <name> --bio <text> --avatar <file>`\n");
    out
}
