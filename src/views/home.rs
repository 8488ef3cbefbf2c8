//! Home feed
//!
//! A fixed showcase: stories, a post, and upcoming features.

use super::format::format_count;
use crate::address::WalletAddress;

struct Story {
    name: &'static str,
    viewed: bool,
}

struct Post {
    user: &'static str,
    likes: u64,
    description: &'static str,
    time_ago: &'static str,
}

const STORIES: [Story; 3] = [
    Story { name: "Vitalik", viewed: false },
    Story { name: "SBF", viewed: true },
    Story { name: "CZ", viewed: false },
];

const POSTS: [Post; 1] = [Post {
    user: "Zaid Shabir",
    likes: 1234,
    description: "Building the future of Web3 messaging! 🚀 #Kraken #Web3 #Blockchain",
    time_ago: "2 hours ago",
}];

const COMING_SOON: [(&str, &str); 2] = [
    ("NFT Messaging", "Message holders of specific NFTs"),
    ("Cross-chain Bridge", "Connect across different blockchains"),
];

pub fn render_home(address: &WalletAddress) -> String {
    let mut out = format!("gm, {}\n\n", address.short());

    let stories: Vec<String> = STORIES
        .iter()
        .map(|s| if s.viewed { format!("({})", s.name) } else { format!("◉ {}", s.name) })
        .collect();
    out.push_str(&format!("Stories: {}\n\n", stories.join("  ")));

    for post in POSTS.iter() {
        out.push_str(&format!("┌ {}\n", post.user));
        out.push_str(&format!("│ ♥ {} likes\n", format_count(post.likes)));
        out.push_str(&format!("│ {}: {}\n", post.user, post.description));
        out.push_str(&format!("└ {}\n\n", post.time_ago));
    }

    out.push_str("Coming Soon\n");
    for (title, blurb) in COMING_SOON {
        out.push_str(&format!("  • {} - {}\n", title, blurb));
    }
    out
}
