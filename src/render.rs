use rand::seq::SliceRandom;
use std::path::Path;

use crate::action::ComponentAction;
use crate::catalog::Blueprint;
use crate::protocol::{
    ButtonStyle, Component, Embed, EmbedField, EmbedFooter, EmbedImage, FileUpload, MessagePayload,
};

/// Black, blurple, white, light grey.
pub const EMBED_PALETTE: [u32; 4] = [0x000000, 0x5865F2, 0xFFFFFF, 0x979C9F];

const WEBSITE_LINK: &str = "[parsed.top](https://www.parsed.top/)";

pub fn random_color() -> u32 {
    EMBED_PALETTE
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(EMBED_PALETTE[1])
}

pub fn pool_title(pool: &str, filter: &str) -> String {
    format!("📦 Pool {} — {}", pool, filter.to_uppercase())
}

pub fn public_delete_note(after_secs: u64) -> String {
    format!("Public messages are set to delete in {} seconds to prevent spam.", after_secs)
}

/// Detail card for one blueprint. With `pool_buttons` the card offers the
/// filtered and unfiltered pool listings.
pub fn blueprint_message(bp: &Blueprint, image: Option<&Path>, pool_buttons: bool) -> MessagePayload {
    let mut embed = Embed {
        title: Some(bp.name.clone()),
        description: Some(format!(
            "🔫 **Weapon:** {}\n📦 **Pool:** {}\n📜 **Status:** {}",
            bp.weapon, bp.pool, bp.status
        )),
        color: random_color(),
        ..Embed::default()
    };

    let upload = image.and_then(|path| {
        let filename = path.file_name()?.to_string_lossy().replace(' ', "_");
        Some(FileUpload {
            path: path.to_path_buf(),
            filename,
        })
    });

    match &upload {
        Some(file) => {
            embed.image = Some(EmbedImage {
                url: format!("attachment://{}", file.filename),
            });
        }
        None => {
            embed.footer = Some(EmbedFooter {
                text: "No image preview available for this blueprint locally.".into(),
            });
        }
    }

    let mut message = MessagePayload::embed(embed);
    if pool_buttons {
        message = message.with_components(vec![Component::row(vec![
            Component::button(
                ComponentAction::ViewPool {
                    pool: bp.pool.clone(),
                    weapon: bp.weapon.clone(),
                }
                .custom_id(),
                "View Model Pool",
                ButtonStyle::Primary,
            ),
            Component::button(
                ComponentAction::ViewAllPool { pool: bp.pool.clone() }.custom_id(),
                "View All Pool Blueprints",
                ButtonStyle::Secondary,
            ),
        ])]);
    }
    if let Some(file) = upload {
        message = message.with_file(file);
    }
    message
}

pub fn website_message() -> MessagePayload {
    MessagePayload::embed(Embed {
        title: Some("🔗 Visit the Blueprint Database".into()),
        description: Some("Check out all weapon blueprints and pools on the full website:".into()),
        color: 0x1ABC9C,
        fields: vec![EmbedField {
            name: "🌐 Website".into(),
            value: WEBSITE_LINK.into(),
            inline: false,
        }],
        ..Embed::default()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameMode {
    Warzone,
    Zombies,
}

impl GameMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "wz" | "mp" => Some(GameMode::Warzone),
            "zombies" => Some(GameMode::Zombies),
            _ => None,
        }
    }
}

const WARZONE_STEPS: &str = "**Working Universally through MP and WZ**\n\n\
1️⃣ **Make a Setup Gun** (base of the gun you want to pull)\n\
(create new -> delete build -> add att [Same As Receiver slots] -> name build Setup)\n\n\
2️⃣ **Find A Print you own** in the same pool as the print you wanna pull, create new build and then fill the same att slots as the Receiver.\n\
(Optional: Rename to Receiver)\n\n\
3️⃣ **Equip the Receiver** and then **equip the Unowned Camo**\n\
(If you are using DB then this is the same just DB shotgun with only DB)\n\
⚠️ {RECOMMENDED: DUPE THE UNOWNED CAMO TO PREVENT WIPING!}\n\n\
4️⃣ **Kill yourself** and then **requip that Build (setup)**\n\n\
5️⃣ **Finally equip the unowned camo again to save it**\n\
(or just equip a att 2x on build)\n\n\
⚠️ PLEASE KEEP IN MIND IF YOU ARE IN A BROKEN STATE THEN IN ORDER TO SAVE BLUEPRINTS YOU MUST DELETE ANY BUILD AND THEN SAVE IT (THE SAME WAY THE CAMO SWAP SAVE WORKS)\n\n\
💡 keep it noted that prints are pulled in half's and currently there is not a way the pull the full prints in one method\n\
if you wish to get the full print you must find the right Receiver attachment combo that pulls the full print (likely hood 1/20 roughly)\n\
but it doesn't matter just throw a nice camo on and you'll be set! 😎";

const ZOMBIES_STEPS: &str = "⚠️ First, it’s important to know that this exploit only works on **PS5 and Xbox Series X/S**, last-gen consoles and PC players do not have access to split-screen, so this won’t work for you.\n\
Also, Player 2 doesn’t need a leveled-up account, but having one makes the pulls easier. If Player 2 uses a fresh account, you may need to perform an extra glitch to equip locked weapons in your Zombies loadout.\n\n\
🔧 Now, here’s how it works:\n\
1️⃣ **Launch Call of Duty** and go into Zombies mode.\n\
2️⃣ **Connect a second controller** and sign in with your secondary profile.\n\
3️⃣ **Set up Player 2’s loadout** with the weapon you want to pull prints for (like the LADRA).\n\
4️⃣ **Back out to the screen** where you can edit your main loadouts—that will affect Controller 1’s loadouts.\n\
5️⃣ On your main account, **equip the blueprint you want to use** to pull the print.\n\
6️⃣ After that, **back out to the main menu** where you can select Multiplayer, Zombies, or Campaign.\n\
7️⃣ With Controller 2, **select Zombies mode**.\n\
8️⃣ Finally, **go back to Player 1’s main loadout**, and you should see the print you were trying to pull, as long as you’ve followed everything correctly.";

pub fn howto_message(mode: GameMode) -> MessagePayload {
    let (title, description, color, footer) = match mode {
        GameMode::Warzone => (
            "🎮 Blueprint Pulling — MP & Warzone Method",
            WARZONE_STEPS,
            0x3498DB,
            "Use /pool and /blueprint for fast lookups.",
        ),
        GameMode::Zombies => (
            "🧟 Zombies Blueprint Pulling (Split-Screen Exploit)",
            ZOMBIES_STEPS,
            0xE74C3C,
            "Use /pool to explore blueprints across pools and categories.",
        ),
    };

    MessagePayload::embed(Embed {
        title: Some(title.into()),
        description: Some(description.into()),
        color,
        fields: vec![EmbedField {
            name: "🌐 Browse Blueprint Pools".into(),
            value: WEBSITE_LINK.into(),
            inline: false,
        }],
        footer: Some(EmbedFooter { text: footer.into() }),
        ..Embed::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BlueprintStatus, WeaponCategory};

    fn storm_rage() -> Blueprint {
        Blueprint {
            name: "STORM RAGE".into(),
            weapon: "LADRA".into(),
            category: WeaponCategory::Smgs,
            pool: "12".into(),
            status: BlueprintStatus::Released,
        }
    }

    #[test]
    fn test_blueprint_card_without_image() {
        let message = blueprint_message(&storm_rage(), None, true);
        let embed = &message.embeds[0];
        assert_eq!(embed.title.as_deref(), Some("STORM RAGE"));
        assert_eq!(
            embed.description.as_deref(),
            Some("🔫 **Weapon:** LADRA\n📦 **Pool:** 12\n📜 **Status:** RELEASED")
        );
        assert!(EMBED_PALETTE.contains(&embed.color));
        assert!(embed.image.is_none());
        assert!(embed.footer.as_ref().unwrap().text.starts_with("No image preview"));
        assert!(message.file.is_none());

        let ids: Vec<_> = message.components[0]
            .components
            .iter()
            .filter_map(|c| c.custom_id.clone())
            .collect();
        assert_eq!(ids, vec!["pool:weapon:12:LADRA".to_string(), "pool:all:12".to_string()]);
    }

    #[test]
    fn test_blueprint_card_attaches_sanitized_image() {
        let path = Path::new("/images/LADRA/STORM RAGE.jpg");
        let message = blueprint_message(&storm_rage(), Some(path), false);
        let embed = &message.embeds[0];
        assert_eq!(embed.image.as_ref().unwrap().url, "attachment://STORM_RAGE.jpg");
        assert!(embed.footer.is_none());
        assert_eq!(message.file.as_ref().unwrap().filename, "STORM_RAGE.jpg");
        assert_eq!(message.attachments[0].filename, "STORM_RAGE.jpg");
        assert!(message.components.is_empty());
    }

    #[test]
    fn test_howto_modes() {
        assert_eq!(GameMode::parse("WZ"), Some(GameMode::Warzone));
        assert_eq!(GameMode::parse("zombies"), Some(GameMode::Zombies));
        assert_eq!(GameMode::parse("campaign"), None);

        let zombies = howto_message(GameMode::Zombies);
        let embed = &zombies.embeds[0];
        assert!(embed.title.as_deref().unwrap().contains("Zombies"));
        assert!(embed.fields[0].value.contains("https://www.parsed.top/"));
    }

    #[test]
    fn test_pool_title_uppercases_filter() {
        assert_eq!(pool_title("12", "assault rifles"), "📦 Pool 12 — ASSAULT RIFLES");
    }
}
