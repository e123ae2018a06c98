//! Tracked metrics and the registry they are assembled into.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether a metric is a skill (level + experience) or an activity/boss (score).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Skill,
    Activity,
}

/// How the remote addresses a leaderboard position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexMode {
    /// A fetch at index `i` returns the rows starting at rank `i`.
    #[default]
    Rank,
    /// A fetch at index `i` returns the `i`-th fixed-size page.
    Page,
}

impl IndexMode {
    /// Query parameter the remote expects for this mode.
    pub fn query_key(&self) -> &'static str {
        match self {
            IndexMode::Rank => "rank",
            IndexMode::Page => "page",
        }
    }
}

/// A tracked leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Metric {
    name: String,
    table: u32,
    category: Option<u32>,
    index_mode: IndexMode,
}

impl Metric {
    /// A skill metric; skills have no category on the remote.
    pub fn skill(name: impl Into<String>, table: u32) -> Self {
        Self {
            name: name.into(),
            table,
            category: None,
            index_mode: IndexMode::Rank,
        }
    }

    /// An activity or boss metric.
    pub fn activity(name: impl Into<String>, table: u32, category: u32) -> Self {
        Self {
            name: name.into(),
            table,
            category: Some(category),
            index_mode: IndexMode::Rank,
        }
    }

    pub fn with_index_mode(mut self, index_mode: IndexMode) -> Self {
        self.index_mode = index_mode;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> u32 {
        self.table
    }

    pub fn category(&self) -> Option<u32> {
        self.category
    }

    pub fn kind(&self) -> MetricKind {
        match self.category {
            Some(_) => MetricKind::Activity,
            None => MetricKind::Skill,
        }
    }

    pub fn index_mode(&self) -> IndexMode {
        self.index_mode
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// (name, table, category)
type MetricRow = (&'static str, u32, Option<u32>);

const STANDARD_METRICS: &[MetricRow] = &[
    ("Overall", 0, None),
    ("Attack", 1, None),
    ("Defence", 2, None),
    ("Strength", 3, None),
    ("Hitpoints", 4, None),
    ("Ranged", 5, None),
    ("Prayer", 6, None),
    ("Magic", 7, None),
    ("Cooking", 8, None),
    ("Woodcutting", 9, None),
    ("Fletching", 10, None),
    ("Fishing", 11, None),
    ("Firemaking", 12, None),
    ("Crafting", 13, None),
    ("Smithing", 14, None),
    ("Mining", 15, None),
    ("Herblore", 16, None),
    ("Agility", 17, None),
    ("Thieving", 18, None),
    ("Slayer", 19, None),
    ("Farming", 20, None),
    ("Runecrafting", 21, None),
    ("Hunter", 22, None),
    ("Construction", 23, None),
    ("Clue Scrolls (all)", 6, Some(1)),
    ("Clue Scrolls (beginner)", 7, Some(1)),
    ("Clue Scrolls (easy)", 8, Some(1)),
    ("Clue Scrolls (medium)", 9, Some(1)),
    ("Clue Scrolls (hard)", 10, Some(1)),
    ("Clue Scrolls (elite)", 11, Some(1)),
    ("Clue Scrolls (master)", 12, Some(1)),
    ("LMS - Rank", 13, Some(1)),
    ("PVP Arena - Rank", 14, Some(1)),
    ("Soul Wars Zeal", 15, Some(1)),
    ("Rifts Closed", 16, Some(1)),
    ("Abyssal Sire", 17, Some(1)),
    ("Alchemical Hydra", 18, Some(1)),
    ("Artio", 19, Some(1)),
    ("Barrows Chests", 20, Some(1)),
    ("Bryophyta", 21, Some(1)),
    ("Callisto", 22, Some(1)),
    ("Calvar'ion", 23, Some(1)),
    ("Cerberus", 24, Some(1)),
    ("Chambers of Xeric", 25, Some(1)),
    ("Chambers of Xeric: Challenge Mode", 26, Some(1)),
    ("Chaos Elemental", 27, Some(1)),
    ("Chaos Fanatic", 28, Some(1)),
    ("Commander Zilyana", 29, Some(1)),
    ("Corporeal Beast", 30, Some(1)),
    ("Crazy Archaeologist", 31, Some(1)),
    ("Dagannoth Prime", 32, Some(1)),
    ("Dagannoth Rex", 33, Some(1)),
    ("Dagannoth Supreme", 34, Some(1)),
    ("Deranged Archaeologist", 35, Some(1)),
    ("Duke Sucellus", 36, Some(1)),
    ("General Graardor", 37, Some(1)),
    ("Giant Mole", 38, Some(1)),
    ("Grotesque Guardians", 39, Some(1)),
    ("Hespori", 40, Some(1)),
    ("Kalphite Queen", 41, Some(1)),
    ("King Black Dragon", 42, Some(1)),
    ("Kraken", 43, Some(1)),
    ("Kree'arra", 44, Some(1)),
    ("K'ril Tsutsaroth", 45, Some(1)),
    ("Mimic", 46, Some(1)),
    ("Nex", 47, Some(1)),
    ("Nightmare", 48, Some(1)),
    ("Phosani's Nightmare", 49, Some(1)),
    ("Obor", 50, Some(1)),
    ("Phantom Muspah", 51, Some(1)),
    ("Sarachnis", 52, Some(1)),
    ("Scorpia", 53, Some(1)),
    ("Skotizo", 54, Some(1)),
    ("Spindel", 55, Some(1)),
    ("Tempoross", 56, Some(1)),
    ("The Gauntlet", 57, Some(1)),
    ("The Corrupted Gauntlet", 58, Some(1)),
    ("The Leviathan", 59, Some(1)),
    ("The Whisperer", 60, Some(1)),
    ("Theatre of Blood", 61, Some(1)),
    ("Theatre of Blood: Hard Mode", 62, Some(1)),
    ("Thermonuclear Smoke Devil", 63, Some(1)),
    ("Tombs of Amascut", 64, Some(1)),
    ("Tombs of Amascut: Expert Mode", 65, Some(1)),
    ("TzKal-Zuk", 66, Some(1)),
    ("TzTok-Jad", 67, Some(1)),
    ("Vardorvis", 68, Some(1)),
    ("Venenatis", 69, Some(1)),
    ("Vet'ion", 70, Some(1)),
    ("Vorkath", 71, Some(1)),
    ("Wintertodt", 72, Some(1)),
    ("Zalcano", 73, Some(1)),
    ("Zulrah", 74, Some(1)),
];

/// Only listed on the seasonal hiscores, ahead of every other metric.
const SEASONAL_METRICS: &[MetricRow] = &[("League Points", 0, Some(1))];

/// Only listed on the regular hiscores, after every other metric.
const NON_SEASONAL_METRICS: &[MetricRow] = &[
    ("Bounty Hunter Hunter", 2, Some(1)),
    ("Bounty Hunter Rogue", 3, Some(1)),
    ("Bounty Hunter Hunter (Legacy)", 4, Some(1)),
    ("Bounty Hunter Rogue (Legacy)", 5, Some(1)),
];

fn metric_from_row(&(name, table, category): &MetricRow, index_mode: IndexMode) -> Metric {
    let metric = match category {
        Some(category) => Metric::activity(name, table, category),
        None => Metric::skill(name, table),
    };
    metric.with_index_mode(index_mode)
}

/// Immutable, ordered list of the metrics a run visits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricRegistry {
    metrics: Vec<Metric>,
}

impl MetricRegistry {
    /// Assemble the registry from the static table.
    pub fn build(seasonal: bool, index_mode: IndexMode) -> Self {
        let rows: Vec<&MetricRow> = if seasonal {
            SEASONAL_METRICS.iter().chain(STANDARD_METRICS).collect()
        } else {
            STANDARD_METRICS.iter().chain(NON_SEASONAL_METRICS).collect()
        };

        Self {
            metrics: rows
                .into_iter()
                .map(|row| metric_from_row(row, index_mode))
                .collect(),
        }
    }

    /// Registry over an explicit metric list.
    pub fn from_metrics(metrics: Vec<Metric>) -> Self {
        Self { metrics }
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    /// The first `limit` metrics, or all of them when `limit` is `None`.
    pub fn limited(&self, limit: Option<usize>) -> &[Metric] {
        match limit {
            Some(limit) => &self.metrics[..limit.min(self.metrics.len())],
            None => &self.metrics,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Metric> {
        self.metrics.iter().find(|m| m.name() == name)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Metric> {
        self.metrics.iter()
    }
}
