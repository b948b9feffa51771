//! Filter pipeline.
//!
//! A `FilterSpec` is the user-facing filter state. Compiling it yields a
//! `FilterPipeline` whose stages run in a fixed order, each one narrowing
//! the candidate set:
//!
//! 1. Exclusion patterns (drop on any match)
//! 2. Free-text search (plain, case-insensitive substring)
//! 3. Level expression (`<n`, `>n` or `n`)
//! 4. Wishlist patterns (keep on any match, only when active)
//!
//! Malformed input never aborts the pipeline. A pattern that fails to
//! compile never matches, and an unparsable level expression is a no-op.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use wildlife_core::FilterSettings;

use crate::source::RecordView;

// =============================================================================
// Filter Spec
// =============================================================================

/// User-editable filter state. Every field is independently optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Regex sources; a name matching any of them is hidden.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Plain substring searched in names.
    #[serde(default)]
    pub search_text: Option<String>,

    /// Level expression such as `<5`, `>10` or `7`.
    #[serde(default)]
    pub level_expr: Option<String>,

    /// Regex sources; when active, only names matching one of them are kept.
    /// An empty or all-blank list is no constraint.
    #[serde(default)]
    pub wishlist_patterns: Vec<String>,

    /// Whether the wishlist stage runs.
    #[serde(default)]
    pub wishlist_active: bool,
}

impl FilterSpec {
    /// Replace both pattern lists with the user's settings.
    pub fn apply_settings(&mut self, settings: &FilterSettings) {
        self.exclude_patterns = settings.excluded_wildlife.clone();
        self.wishlist_patterns = settings.wishlist_wildlife.clone();
    }

    /// Compile into an executable pipeline.
    pub fn compile(&self) -> FilterPipeline {
        let mut skipped = Vec::new();
        let exclude = compile_patterns(&self.exclude_patterns, &mut skipped);
        let wishlist = if self.wishlist_active && has_patterns(&self.wishlist_patterns) {
            Some(compile_patterns(&self.wishlist_patterns, &mut skipped))
        } else {
            None
        };

        let search = self
            .search_text
            .as_deref()
            .filter(|text| !text.trim().is_empty())
            .map(str::to_lowercase);

        let level = self.level_expr.as_deref().and_then(|expr| {
            let parsed = LevelFilter::parse(expr);
            if parsed.is_none() && !expr.trim().is_empty() {
                tracing::debug!("Ignoring unparsable level expression {:?}", expr);
            }
            parsed
        });

        FilterPipeline {
            exclude,
            search,
            level,
            wishlist,
            skipped,
        }
    }

    /// Compile and apply in one call.
    pub fn apply<R, I>(&self, rows: I) -> Vec<R>
    where
        R: RecordView,
        I: IntoIterator<Item = R>,
    {
        self.compile().apply(rows)
    }
}

fn has_patterns(sources: &[String]) -> bool {
    sources.iter().any(|source| !source.trim().is_empty())
}

/// Compile pattern sources, dropping blank and invalid ones.
fn compile_patterns(sources: &[String], skipped: &mut Vec<String>) -> Vec<Regex> {
    sources
        .iter()
        .filter(|source| !source.trim().is_empty())
        .filter_map(|source| {
            match RegexBuilder::new(source).case_insensitive(true).build() {
                Ok(regex) => Some(regex),
                Err(e) => {
                    tracing::warn!("Skipping invalid pattern {:?}: {}", source, e);
                    skipped.push(source.clone());
                    None
                }
            }
        })
        .collect()
}

// =============================================================================
// Level Filter
// =============================================================================

/// Parsed level expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelFilter {
    /// `<n`
    Below(i64),
    /// `>n`
    Above(i64),
    /// `n`
    Exactly(i64),
}

impl LevelFilter {
    /// Parse a level expression. Returns `None` for anything unrecognised.
    pub fn parse(expr: &str) -> Option<Self> {
        let expr = expr.trim();
        if let Some(rest) = expr.strip_prefix('<') {
            return rest.trim().parse().ok().map(LevelFilter::Below);
        }
        if let Some(rest) = expr.strip_prefix('>') {
            return rest.trim().parse().ok().map(LevelFilter::Above);
        }
        expr.parse().ok().map(LevelFilter::Exactly)
    }

    pub fn matches(&self, level: u32) -> bool {
        let level = i64::from(level);
        match *self {
            LevelFilter::Below(n) => level < n,
            LevelFilter::Above(n) => level > n,
            LevelFilter::Exactly(n) => level == n,
        }
    }
}

// =============================================================================
// Filter Pipeline
// =============================================================================

/// Compiled filter stages.
#[derive(Debug, Clone)]
pub struct FilterPipeline {
    exclude: Vec<Regex>,
    /// Lowercased search text.
    search: Option<String>,
    level: Option<LevelFilter>,
    /// `None` when the wishlist is inactive or has no patterns.
    wishlist: Option<Vec<Regex>>,
    skipped: Vec<String>,
}

impl FilterPipeline {
    /// Keep the rows that pass every stage, in input order.
    pub fn apply<R, I>(&self, rows: I) -> Vec<R>
    where
        R: RecordView,
        I: IntoIterator<Item = R>,
    {
        rows.into_iter().filter(|row| self.keeps(row)).collect()
    }

    /// Check a single row against every stage.
    pub fn keeps<R: RecordView>(&self, row: &R) -> bool {
        let name = row.display_name();

        if self.exclude.iter().any(|regex| regex.is_match(name)) {
            return false;
        }

        if let Some(search) = &self.search {
            if !name.to_lowercase().contains(search.as_str()) {
                return false;
            }
        }

        if let Some(level) = &self.level {
            if !level.matches(row.record().base_level) {
                return false;
            }
        }

        match &self.wishlist {
            Some(wishlist) => wishlist.iter().any(|regex| regex.is_match(name)),
            None => true,
        }
    }

    /// Parsed level expression, if any.
    pub fn level(&self) -> Option<LevelFilter> {
        self.level
    }

    /// Pattern sources that failed to compile and were skipped.
    pub fn skipped_patterns(&self) -> &[String] {
        &self.skipped
    }
}

// =============================================================================
// Tests
// =============================================================================
