//! Light/dark theme state.
//!
//! [`ThemeState::apply`] is the only place style values are decided: it
//! turns a theme into a deterministic list of assignments that a renderer
//! (here, [`ThemeStyles::to_css`]) writes out in one pass.

use crate::error::StorageError;
use crate::storage::{KeyValueStore, THEME_KEY};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    /// Persisted choice if it is valid, otherwise the platform preference.
    pub fn resolve(saved: Option<&str>, prefers_dark: bool) -> Theme {
        match saved.and_then(|s| s.parse().ok()) {
            Some(theme) => theme,
            None if prefers_dark => Theme::Dark,
            None => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleTarget {
    /// Custom property on the document root.
    Root,
    Body,
    Selector(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleAssignment {
    pub target: StyleTarget,
    pub property: &'static str,
    /// An empty value resets the property to the stylesheet default.
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeStyles {
    pub theme: Theme,
    /// Whether the root element carries the `light` class.
    pub light_class: bool,
    pub assignments: Vec<StyleAssignment>,
}

const CARDS: &str = ".card, .modal-card";
const FIELDS: &str = "textarea, input, select";
const SMALL_BUTTONS: &str = ".small-btn";
const BUTTONS: &str = "button.btn";
const TAGS: &str = ".tag";
const WRAP: &str = ".wrap";

const LIGHT_VARS: [(&str, &str); 10] = [
    ("--bg-start", "#f6f8fb"),
    ("--bg-end", "#eef3fb"),
    ("--wrap-bg", "linear-gradient(180deg,#ffffff,#fbfdff)"),
    ("--card", "rgba(255,255,255,0.98)"),
    ("--card-border", "rgba(15,23,42,0.06)"),
    ("--accent", "#8b5cf6"),
    ("--muted", "#475569"),
    ("--glass", "rgba(11,15,30,0.02)"),
    ("--card-shadow", "0 8px 20px rgba(11,15,30,0.06)"),
    (
        "--inner-shine",
        "linear-gradient(180deg, rgba(255,255,255,0.6), rgba(255,255,255,0.02))",
    ),
];

const DARK_VARS: [(&str, &str); 10] = [
    ("--bg-start", "#071029"),
    ("--bg-end", "#0b1530"),
    (
        "--wrap-bg",
        "linear-gradient(180deg, rgba(255,255,255,0.02), rgba(255,255,255,0.01))",
    ),
    ("--card", "rgba(255,255,255,0.02)"),
    ("--card-border", "rgba(255,255,255,0.04)"),
    ("--accent", "#6ee7b7"),
    ("--muted", "#94a3b8"),
    ("--glass", "rgba(255,255,255,0.03)"),
    ("--card-shadow", "0 8px 30px rgba(2,6,23,0.6)"),
    ("--inner-shine", "none"),
];

const LIGHT_ELEMENTS: [(&str, &str, &str); 19] = [
    (WRAP, "background", "linear-gradient(180deg,#ffffff,#fbfdff)"),
    (WRAP, "box-shadow", "0 8px 20px rgba(11,15,30,0.06)"),
    (WRAP, "border-radius", "14px"),
    (CARDS, "background", "var(--card)"),
    (CARDS, "color", "#071029"),
    (CARDS, "border", "1px solid rgba(15,23,42,0.06)"),
    (CARDS, "box-shadow", "0 6px 18px rgba(11,15,30,0.04)"),
    (FIELDS, "background", "#fff"),
    (FIELDS, "color", "#071029"),
    (FIELDS, "border", "1px solid rgba(15,23,42,0.06)"),
    (SMALL_BUTTONS, "background", "transparent"),
    (SMALL_BUTTONS, "border", "1px solid rgba(15,23,42,0.06)"),
    (SMALL_BUTTONS, "color", "#374151"),
    (BUTTONS, "background", "linear-gradient(90deg,var(--accent),#6d28d9)"),
    (BUTTONS, "color", "#fff"),
    (BUTTONS, "box-shadow", "0 6px 18px rgba(99,102,241,0.08)"),
    (TAGS, "background", "rgba(15,23,42,0.03)"),
    (TAGS, "border", "1px solid rgba(15,23,42,0.04)"),
    (TAGS, "color", "#0b1220"),
];

const DARK_RESET_SELECTORS: [&str; 6] = [WRAP, CARDS, FIELDS, SMALL_BUTTONS, BUTTONS, TAGS];
const DARK_RESET_PROPERTIES: [&str; 4] = ["background", "color", "border", "box-shadow"];

pub struct ThemeState;

impl ThemeState {
    pub fn apply(theme: Theme) -> ThemeStyles {
        let mut assignments = Vec::new();
        match theme {
            Theme::Light => {
                push_vars(&mut assignments, &LIGHT_VARS);
                assignments.push(body_color("#071029"));
                for (selector, property, value) in LIGHT_ELEMENTS {
                    assignments.push(StyleAssignment {
                        target: StyleTarget::Selector(selector),
                        property,
                        value: value.to_string(),
                    });
                }
            }
            Theme::Dark => {
                push_vars(&mut assignments, &DARK_VARS);
                assignments.push(body_color("#e6eef8"));
                for selector in DARK_RESET_SELECTORS {
                    for property in DARK_RESET_PROPERTIES {
                        assignments.push(StyleAssignment {
                            target: StyleTarget::Selector(selector),
                            property,
                            value: String::new(),
                        });
                    }
                }
            }
        }

        ThemeStyles {
            theme,
            light_class: theme == Theme::Light,
            assignments,
        }
    }
}

fn push_vars(out: &mut Vec<StyleAssignment>, vars: &[(&'static str, &'static str)]) {
    out.extend(vars.iter().map(|&(property, value)| StyleAssignment {
        target: StyleTarget::Root,
        property,
        value: value.to_string(),
    }));
}

fn body_color(value: &str) -> StyleAssignment {
    StyleAssignment {
        target: StyleTarget::Body,
        property: "color",
        value: value.to_string(),
    }
}

impl ThemeStyles {
    /// Renders the assignments as a stylesheet. Reset assignments are left
    /// out so the base stylesheet applies.
    pub fn to_css(&self) -> String {
        let mut blocks: Vec<(String, Vec<String>)> = Vec::new();
        for a in self.assignments.iter().filter(|a| !a.value.is_empty()) {
            let selector = match a.target {
                StyleTarget::Root => ":root".to_string(),
                StyleTarget::Body => "body".to_string(),
                StyleTarget::Selector(s) => s.to_string(),
            };
            let line = format!("  {}: {};", a.property, a.value);
            match blocks.iter_mut().find(|(s, _)| *s == selector) {
                Some((_, lines)) => lines.push(line),
                None => blocks.push((selector, vec![line])),
            }
        }

        let mut css = format!("/* theme: {} */\n", self.theme);
        for (selector, lines) in blocks {
            css.push_str(&format!("{} {{\n{}\n}}\n", selector, lines.join("\n")));
        }
        css
    }
}

pub fn load_theme(store: &dyn KeyValueStore, prefers_dark: bool) -> Theme {
    Theme::resolve(store.get(THEME_KEY).as_deref(), prefers_dark)
}

pub fn save_theme(store: &dyn KeyValueStore, theme: Theme) -> Result<(), StorageError> {
    store.set(THEME_KEY, theme.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_resolve_prefers_saved_value() {
        assert_eq!(Theme::resolve(Some("light"), true), Theme::Light);
        assert_eq!(Theme::resolve(Some("dark"), false), Theme::Dark);
        assert_eq!(Theme::resolve(Some("purple"), true), Theme::Dark);
        assert_eq!(Theme::resolve(None, false), Theme::Light);
    }

    #[test]
    fn test_apply_is_deterministic() {
        assert_eq!(ThemeState::apply(Theme::Light), ThemeState::apply(Theme::Light));
        assert_eq!(ThemeState::apply(Theme::Dark), ThemeState::apply(Theme::Dark));
    }

    #[test]
    fn test_light_styles() {
        let styles = ThemeState::apply(Theme::Light);
        assert!(styles.light_class);
        assert!(styles.assignments.contains(&StyleAssignment {
            target: StyleTarget::Root,
            property: "--accent",
            value: "#8b5cf6".to_string(),
        }));
        assert!(styles.assignments.iter().all(|a| !a.value.is_empty()));

        let css = styles.to_css();
        assert!(css.contains(":root {"));
        assert!(css.contains("  border-radius: 14px;"));
    }

    #[test]
    fn test_dark_resets_element_styles() {
        let styles = ThemeState::apply(Theme::Dark);
        assert!(!styles.light_class);
        let resets = styles
            .assignments
            .iter()
            .filter(|a| matches!(a.target, StyleTarget::Selector(_)))
            .count();
        assert_eq!(resets, DARK_RESET_SELECTORS.len() * DARK_RESET_PROPERTIES.len());
        assert!(!styles.to_css().contains(".tag"));
    }

    #[test]
    fn test_theme_persists() {
        let store = MemoryStore::new();
        assert_eq!(load_theme(&store, true), Theme::Dark);
        save_theme(&store, Theme::Light).unwrap();
        assert_eq!(load_theme(&store, true), Theme::Light);
    }
}
