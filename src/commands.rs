use serde_json::{json, Value};

use crate::catalog::WeaponCategory;
use crate::error::BotError;
use crate::protocol::{Choice, InteractionData};
use crate::render::GameMode;
use crate::transport::{RestTransport, TransportError};

/// Autocomplete and choice lists are capped at this many entries.
const MAX_CHOICES: usize = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Blueprint { nameid: String },
    Pool { number: String, weapontype: String },
    Website,
    HowTo { gamemode: GameMode },
}

impl Command {
    pub fn parse(data: &InteractionData) -> Result<Self, BotError> {
        let name = data
            .name
            .as_deref()
            .ok_or_else(|| BotError::InvalidInteraction("command without a name".into()))?;

        let text = |option: &str| data.option(option).and_then(|o| o.as_text());
        let required = |option: &str| {
            text(option).ok_or_else(|| {
                BotError::InvalidInteraction(format!("/{} is missing `{}`", name, option))
            })
        };

        match name {
            "blueprint" => Ok(Command::Blueprint { nameid: required("nameid")? }),
            "pool" => Ok(Command::Pool {
                number: required("number")?,
                weapontype: text("weapontype")
                    .map(|w| w.trim().to_lowercase())
                    .filter(|w| !w.is_empty())
                    .unwrap_or_else(|| "all".into()),
            }),
            "website" => Ok(Command::Website),
            "howto" => {
                let raw = required("gamemode")?;
                let gamemode = GameMode::parse(&raw).ok_or_else(|| {
                    BotError::InvalidInteraction(format!("unknown gamemode {:?}", raw))
                })?;
                Ok(Command::HowTo { gamemode })
            }
            other => Err(BotError::InvalidInteraction(format!("unknown command /{}", other))),
        }
    }

    /// Whether the command sends a rich embed counted by the global rate limit.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Command::Blueprint { .. } | Command::Pool { .. })
    }
}

/// Category names plus `all` containing `current`, case-insensitively.
pub fn weapontype_choices(current: &str) -> Vec<Choice> {
    let needle = current.trim().to_lowercase();
    WeaponCategory::ALL
        .iter()
        .map(|c| c.name())
        .chain(std::iter::once("all"))
        .filter(|name| name.contains(needle.as_str()))
        .take(MAX_CHOICES)
        .map(|name| Choice {
            name: name.to_string(),
            value: name.to_string(),
        })
        .collect()
}

/// Slash-command definitions in the registration API's shape.
pub fn definitions() -> Value {
    json!([
        {
            "name": "blueprint",
            "description": "Look up a blueprint by name",
            "options": [{
                "type": 3,
                "name": "nameid",
                "description": "Name of the blueprint (e.g., STORM RAGE)",
                "required": true
            }]
        },
        {
            "name": "pool",
            "description": "View all blueprints in a specific pool",
            "options": [
                {
                    "type": 4,
                    "name": "number",
                    "description": "Pool number (e.g. 1)",
                    "required": true
                },
                {
                    "type": 3,
                    "name": "weapontype",
                    "description": "Weapon type filter (e.g. smgs, assault rifles, all)",
                    "required": false,
                    "autocomplete": true
                }
            ]
        },
        {
            "name": "website",
            "description": "View the Blueprint Database Website"
        },
        {
            "name": "howto",
            "description": "Learn how blueprint pulling works",
            "options": [{
                "type": 3,
                "name": "gamemode",
                "description": "Choose a gamemode: wz/mp or zombies",
                "required": true,
                "choices": [
                    {"name": "Warzone / Multiplayer", "value": "wz"},
                    {"name": "Zombies", "value": "zombies"}
                ]
            }]
        }
    ])
}

/// Replaces the application's global commands with [`definitions`].
pub async fn register(transport: &RestTransport) -> Result<(), TransportError> {
    let path = format!("/applications/{}/commands", transport.application_id());
    transport.put_json(&path, &definitions()).await
}
