//! Keymap compilation.
//!
//! The compositor never interprets keymaps itself, it only needs one compiled and attached to a
//! keyboard before key events can be delivered to clients. [`KeymapCompiler`] is the seam to the
//! compiler; [`DefaultKeymaps`] resolves rule names the way xkbcommon does for an empty request and
//! produces the textual keymap clients receive.
use anyhow::{Context, Result, bail};
use log::debug;
use serde::Deserialize;

/// RMLVO names. Empty fields ask the compiler for its default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuleNames {
    pub rules: String,
    pub model: String,
    pub layout: String,
    pub variant: String,
    pub options: String,
}

/// A compiled keymap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keymap {
    /// The names after defaults were applied.
    pub names: RuleNames,
    /// The keymap in xkb text format v1, as sent to clients.
    pub text: String,
}

impl Keymap {
    pub fn layouts(&self) -> impl Iterator<Item = &str> {
        self.names.layout.split(',')
    }
}

pub trait KeymapCompiler {
    fn compile(&self, names: &RuleNames) -> Result<Keymap>;
}

const DEFAULT_RULES: &str = "evdev";
const DEFAULT_MODEL: &str = "pc105";
const DEFAULT_LAYOUT: &str = "us";

/// The built-in compiler. It accepts any syntactically valid layout list.
#[derive(Debug, Default)]
pub struct DefaultKeymaps;

impl KeymapCompiler for DefaultKeymaps {
    fn compile(&self, names: &RuleNames) -> Result<Keymap> {
        let names = resolve_defaults(names);

        let layouts: Vec<&str> = names.layout.split(',').collect();
        for layout in &layouts {
            validate_component(layout).with_context(|| format!("Invalid layout {layout:?}"))?;
        }

        let variants: Vec<&str> = if names.variant.is_empty() {
            Vec::new()
        } else {
            names.variant.split(',').collect()
        };
        if variants.len() > layouts.len() {
            bail!(
                "{} variants given for {} layouts",
                variants.len(),
                layouts.len()
            );
        }
        for variant in variants.iter().filter(|v| !v.is_empty()) {
            validate_component(variant).with_context(|| format!("Invalid variant {variant:?}"))?;
        }

        let symbols = symbols(&names.model, &layouts, &variants);
        debug!("Compiled keymap with symbols {symbols:?}");

        let text = format!(
            "xkb_keymap {{\n\
             \txkb_keycodes  {{ include \"{rules}+aliases(qwerty)\" }};\n\
             \txkb_types     {{ include \"complete\" }};\n\
             \txkb_compat    {{ include \"complete\" }};\n\
             \txkb_symbols   {{ include \"{symbols}\" }};\n\
             }};\n",
            rules = names.rules,
        );

        Ok(Keymap { names, text })
    }
}

fn resolve_defaults(names: &RuleNames) -> RuleNames {
    fn or_default(value: &str, default: &str) -> String {
        if value.is_empty() {
            default.into()
        } else {
            value.into()
        }
    }

    RuleNames {
        rules: or_default(&names.rules, DEFAULT_RULES),
        model: or_default(&names.model, DEFAULT_MODEL),
        layout: or_default(&names.layout, DEFAULT_LAYOUT),
        // A variant only makes sense for the layout it was given for.
        variant: if names.layout.is_empty() {
            String::new()
        } else {
            names.variant.clone()
        },
        options: names.options.clone(),
    }
}

fn validate_component(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("Empty name");
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        bail!("Unexpected character {c:?}");
    }
    Ok(())
}

fn symbols(model: &str, layouts: &[&str], variants: &[&str]) -> String {
    let base = if model.starts_with("pc") { "pc" } else { model };
    let mut symbols = base.to_string();
    for (index, layout) in layouts.iter().enumerate() {
        symbols.push('+');
        symbols.push_str(layout);
        if let Some(variant) = variants.get(index).filter(|v| !v.is_empty()) {
            symbols.push_str(&format!("({variant})"));
        }
        if index > 0 {
            symbols.push_str(&format!(":{}", index + 1));
        }
    }
    symbols.push_str("+inet(evdev)");
    symbols
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_request_resolves_to_defaults() {
        let keymap = DefaultKeymaps.compile(&RuleNames::default()).unwrap();
        assert_eq!(keymap.names.rules, "evdev");
        assert_eq!(keymap.names.model, "pc105");
        assert_eq!(keymap.layouts().collect::<Vec<_>>(), ["us"]);
        assert!(keymap.text.contains("include \"pc+us+inet(evdev)\""));
    }

    #[test]
    fn multiple_layouts_with_variants() {
        let names = RuleNames {
            layout: "de,us".into(),
            variant: "nodeadkeys".into(),
            ..Default::default()
        };
        let keymap = DefaultKeymaps.compile(&names).unwrap();
        assert!(
            keymap
                .text
                .contains("include \"pc+de(nodeadkeys)+us:2+inet(evdev)\"")
        );
    }

    #[test]
    fn malformed_layout_fails() {
        let names = RuleNames {
            layout: "us,".into(),
            ..Default::default()
        };
        assert!(DefaultKeymaps.compile(&names).is_err());

        let names = RuleNames {
            layout: "u s".into(),
            ..Default::default()
        };
        assert!(DefaultKeymaps.compile(&names).is_err());
    }

    #[test]
    fn more_variants_than_layouts_fails() {
        let names = RuleNames {
            layout: "us".into(),
            variant: "intl,dvorak".into(),
            ..Default::default()
        };
        assert!(DefaultKeymaps.compile(&names).is_err());
    }
}
