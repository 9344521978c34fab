use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

/// Everything a message component can ask for, encoded in its `custom_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentAction {
    Navigate { session: Uuid, direction: Direction },
    PageIndicator { session: Uuid },
    SelectItem { key: String },
    ViewPool { pool: String, weapon: String },
    ViewAllPool { pool: String },
}

const SELECT_ID: &str = "select";

impl ComponentAction {
    /// Custom id shared by every blueprint select menu; the chosen key
    /// arrives in the interaction's `values`.
    pub fn select_custom_id() -> &'static str {
        SELECT_ID
    }

    pub fn custom_id(&self) -> String {
        match self {
            ComponentAction::Navigate { session, direction: Direction::Previous } => {
                format!("nav:prev:{}", session)
            }
            ComponentAction::Navigate { session, direction: Direction::Next } => {
                format!("nav:next:{}", session)
            }
            ComponentAction::PageIndicator { session } => format!("nav:page:{}", session),
            ComponentAction::SelectItem { .. } => SELECT_ID.to_string(),
            ComponentAction::ViewPool { pool, weapon } => format!("pool:weapon:{}:{}", pool, weapon),
            ComponentAction::ViewAllPool { pool } => format!("pool:all:{}", pool),
        }
    }

    pub fn parse(custom_id: &str, values: &[String]) -> Option<Self> {
        if custom_id == SELECT_ID {
            let key = values.first()?.clone();
            return Some(ComponentAction::SelectItem { key });
        }

        let mut parts = custom_id.splitn(3, ':');
        match (parts.next()?, parts.next()?, parts.next()?) {
            ("nav", which, id) => {
                let session = Uuid::parse_str(id).ok()?;
                match which {
                    "prev" => Some(ComponentAction::Navigate { session, direction: Direction::Previous }),
                    "next" => Some(ComponentAction::Navigate { session, direction: Direction::Next }),
                    "page" => Some(ComponentAction::PageIndicator { session }),
                    _ => None,
                }
            }
            ("pool", "all", pool) => Some(ComponentAction::ViewAllPool { pool: pool.to_string() }),
            ("pool", "weapon", rest) => {
                // Weapon names may contain ':', pool ids do not
                let (pool, weapon) = rest.split_once(':')?;
                Some(ComponentAction::ViewPool {
                    pool: pool.to_string(),
                    weapon: weapon.to_string(),
                })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_ids_parse_back() {
        let session = Uuid::new_v4();
        for direction in [Direction::Previous, Direction::Next] {
            let action = ComponentAction::Navigate { session, direction };
            assert_eq!(ComponentAction::parse(&action.custom_id(), &[]), Some(action));
        }
        let indicator = ComponentAction::PageIndicator { session };
        assert_eq!(ComponentAction::parse(&indicator.custom_id(), &[]), Some(indicator));
    }

    #[test]
    fn test_pool_buttons_keep_weapon_name() {
        let action = ComponentAction::ViewPool {
            pool: "12".into(),
            weapon: "AK-74: SPECIAL".into(),
        };
        assert_eq!(action.custom_id(), "pool:weapon:12:AK-74: SPECIAL");
        assert_eq!(ComponentAction::parse(&action.custom_id(), &[]), Some(action));

        assert_eq!(
            ComponentAction::parse("pool:all:3", &[]),
            Some(ComponentAction::ViewAllPool { pool: "3".into() })
        );
    }

    #[test]
    fn test_select_takes_first_value() {
        let values = vec!["STORM RAGE::LADRA::12".to_string()];
        assert_eq!(
            ComponentAction::parse("select", &values),
            Some(ComponentAction::SelectItem { key: "STORM RAGE::LADRA::12".into() })
        );
        assert_eq!(ComponentAction::parse("select", &[]), None);
    }

    #[test]
    fn test_garbage_ids_are_rejected() {
        assert_eq!(ComponentAction::parse("nav:next:not-a-uuid", &[]), None);
        assert_eq!(ComponentAction::parse("nav:sideways:00000000-0000-0000-0000-000000000000", &[]), None);
        assert_eq!(ComponentAction::parse("pool:weapon:12", &[]), None);
        assert_eq!(ComponentAction::parse("hello", &[]), None);
    }
}
