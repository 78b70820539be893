//! Tables and fields walked by the resolution chains.

/// A DB2 table, together with the field that names its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Table {
    pub name: &'static str,
    pub display: Option<&'static str>,
}

impl Table {
    const fn new(name: &'static str) -> Self {
        Self {
            name,
            display: None,
        }
    }
}

pub const SPELL_NAME: Table = Table {
    name: "SpellName",
    display: Some("Name_lang"),
};
pub const SPELL_X_SPELL_VISUAL: Table = Table::new("SpellXSpellVisual");
pub const SPELL_VISUAL_EVENT: Table = Table::new("SpellVisualEvent");
pub const SPELL_VISUAL_KIT_EFFECT: Table = Table::new("SpellVisualKitEffect");
pub const SPELL_VISUAL_KIT_MODEL_ATTACH: Table = Table::new("SpellVisualKitModelAttach");
pub const SPELL_VISUAL_EFFECT_NAME: Table = Table::new("SpellVisualEffectName");
pub const SPELL_PROCEDURAL_EFFECT: Table = Table::new("SpellProceduralEffect");
pub const SPELL_CHAIN_EFFECTS: Table = Table::new("SpellChainEffects");

pub const FIELD_ID: &str = "ID";
pub const FIELD_NAME: &str = "Name_lang";

/// `SpellVisualKitEffect.EffectType` values.
pub mod effect_kind {
    pub const PROCEDURAL: &str = "1";
    pub const MODEL_ATTACH: &str = "2";
}

/// Where the value of an extra filter comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterValue {
    Fixed(&'static str),
    /// The configured side-chain target type.
    TargetType,
}

/// One step of a chain: look every input id up in `table` by `key`, then
/// collect the ids found in `outputs` of each matching row.
#[derive(Debug, Clone, Copy)]
pub struct Hop {
    pub table: Table,
    pub key: &'static str,
    pub filters: &'static [(&'static str, FilterValue)],
    pub outputs: &'static [&'static str],
}

/// Stage 1: spell → visual ids.
pub const SPELL_VISUALS: Hop = Hop {
    table: SPELL_X_SPELL_VISUAL,
    key: "SpellID",
    filters: &[],
    outputs: &["SpellVisualID"],
};

/// Stages 2 to 5, each mapping the previous stage's ids to the next ones.
pub const PRIMARY: [Hop; 4] = [
    Hop {
        table: SPELL_VISUAL_EVENT,
        key: "SpellVisualID",
        filters: &[],
        outputs: &["SpellVisualKitID"],
    },
    Hop {
        table: SPELL_VISUAL_KIT_EFFECT,
        key: "ParentSpellVisualKitID",
        filters: &[("EffectType", FilterValue::Fixed(effect_kind::MODEL_ATTACH))],
        outputs: &["Effect"],
    },
    Hop {
        table: SPELL_VISUAL_KIT_MODEL_ATTACH,
        key: FIELD_ID,
        filters: &[],
        outputs: &["SpellVisualEffectNameID"],
    },
    Hop {
        table: SPELL_VISUAL_EFFECT_NAME,
        key: FIELD_ID,
        filters: &[],
        outputs: &["ModelFileDataID"],
    },
];

/// Side-chain steps a to d, from visual ids to texture file ids.
pub const SIDE: [Hop; 4] = [
    Hop {
        table: SPELL_VISUAL_EVENT,
        key: "SpellVisualID",
        filters: &[("TargetType", FilterValue::TargetType)],
        outputs: &["SpellVisualKitID"],
    },
    Hop {
        table: SPELL_VISUAL_KIT_EFFECT,
        key: "ParentSpellVisualKitID",
        filters: &[("EffectType", FilterValue::Fixed(effect_kind::PROCEDURAL))],
        outputs: &["Effect"],
    },
    Hop {
        table: SPELL_PROCEDURAL_EFFECT,
        key: FIELD_ID,
        filters: &[],
        outputs: &["Value_0"],
    },
    Hop {
        table: SPELL_CHAIN_EFFECTS,
        key: FIELD_ID,
        filters: &[],
        outputs: &[
            "TextureFileDataID_0",
            "TextureFileDataID_1",
            "TextureFileDataID_2",
        ],
    },
];
