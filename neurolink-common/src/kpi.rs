//! KPI derivation from emotion classifications
//!
//! Maps a dominant emotion label plus the classifier's confidence score into
//! five bounded business indicators (engagement, satisfaction, trust, loyalty,
//! opinion), each labelled from a fixed threshold ladder.
//!
//! The emotion is projected onto two affect axes:
//! - **valence** in [-1, 1], looked up from [`VALENCE_TABLE`]
//! - **arousal** in [0, 1], the confidence score divided by 100
//!
//! Randomness never enters the calculation implicitly: callers pass a
//! [`NoiseSource`], and [`NoNoise`] makes the engine fully deterministic.

use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Valence used for labels missing from the table
pub const DEFAULT_VALENCE: f64 = 0.0;

/// Valence per emotion label (lowercase, as emitted by the classifier)
pub const VALENCE_TABLE: &[(&str, f64)] = &[
    ("happy", 1.0),
    ("surprise", 0.2),
    ("neutral", 0.0),
    ("sad", -0.6),
    ("angry", -0.7),
    ("fear", -0.7),
    ("disgust", -0.8),
];

/// One threshold of a label ladder: values `>= min` get `label`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LadderRung {
    pub min: u8,
    pub label: &'static str,
}

const fn rung(min: u8, label: &'static str) -> LadderRung {
    LadderRung { min, label }
}

pub const ENGAGEMENT_LADDER: &[LadderRung] =
    &[rung(75, "strong"), rung(40, "medium"), rung(0, "weak")];

pub const SATISFACTION_LADDER: &[LadderRung] =
    &[rung(70, "very satisfied"), rung(45, "neutral"), rung(0, "dissatisfied")];

pub const TRUST_LADDER: &[LadderRung] =
    &[rung(70, "full trust"), rung(40, "skeptical"), rung(0, "wary")];

pub const LOYALTY_LADDER: &[LadderRung] =
    &[rung(75, "ambassador"), rung(50, "standard"), rung(0, "volatile")];

pub const OPINION_LADDER: &[LadderRung] =
    &[rung(60, "positive"), rung(40, "undecided"), rung(0, "negative")];

/// Ordered threshold ladder, highest rung first
#[derive(Debug, Clone, Copy)]
pub struct LabelLadder {
    pub rungs: &'static [LadderRung],
}

impl LabelLadder {
    pub const fn new(rungs: &'static [LadderRung]) -> Self {
        Self { rungs }
    }

    /// Index of the rung covering `value`
    pub fn rung_index(&self, value: u8) -> usize {
        self.rungs
            .iter()
            .position(|r| value >= r.min)
            .unwrap_or(self.rungs.len().saturating_sub(1))
    }

    /// Label for `value`
    pub fn label(&self, value: u8) -> &'static str {
        self.rungs
            .get(self.rung_index(value))
            .map(|r| r.label)
            .unwrap_or("")
    }

    /// Ladders must partition [0, 100]: strictly descending thresholds, all
    /// within range, the last one at 0.
    pub fn validate(&self, name: &str) -> Result<()> {
        let last = self
            .rungs
            .last()
            .ok_or_else(|| Error::Config(format!("{} ladder is empty", name)))?;
        if last.min != 0 {
            return Err(Error::Config(format!(
                "{} ladder leaves [0, {}) unlabelled",
                name, last.min
            )));
        }
        for pair in self.rungs.windows(2) {
            if pair[0].min <= pair[1].min {
                return Err(Error::Config(format!(
                    "{} ladder thresholds must be strictly descending ({} then {})",
                    name, pair[0].min, pair[1].min
                )));
            }
        }
        if let Some(r) = self.rungs.iter().find(|r| r.min > 100) {
            return Err(Error::Config(format!("{} ladder threshold {} exceeds 100", name, r.min)));
        }
        Ok(())
    }
}

/// Heuristic tables and weights used by [`KpiEngine`]
#[derive(Debug, Clone, Copy)]
pub struct KpiPolicy {
    pub valence_table: &'static [(&'static str, f64)],
    pub default_valence: f64,
    /// Trust baseline before the valence term
    pub trust_base: f64,
    /// Trust points per unit of positive valence
    pub trust_positive_gain: f64,
    /// Trust points per unit of negative valence
    pub trust_negative_gain: f64,
    /// Percentage of loyalty taken from satisfaction; the rest comes from trust
    pub loyalty_satisfaction_pct: u32,
    /// Upper bound (exclusive) of the jitter added to engagement and trust
    pub jitter_max: f64,
    pub engagement: LabelLadder,
    pub satisfaction: LabelLadder,
    pub trust: LabelLadder,
    pub loyalty: LabelLadder,
    pub opinion: LabelLadder,
}

impl Default for KpiPolicy {
    fn default() -> Self {
        Self {
            valence_table: VALENCE_TABLE,
            default_valence: DEFAULT_VALENCE,
            trust_base: 50.0,
            trust_positive_gain: 40.0,
            trust_negative_gain: 40.0,
            loyalty_satisfaction_pct: 70,
            jitter_max: 5.0,
            engagement: LabelLadder::new(ENGAGEMENT_LADDER),
            satisfaction: LabelLadder::new(SATISFACTION_LADDER),
            trust: LabelLadder::new(TRUST_LADDER),
            loyalty: LabelLadder::new(LOYALTY_LADDER),
            opinion: LabelLadder::new(OPINION_LADDER),
        }
    }
}

impl KpiPolicy {
    pub fn with_jitter_max(mut self, jitter_max: f64) -> Self {
        self.jitter_max = jitter_max;
        self
    }

    /// Valence for an emotion label; unknown labels get the neutral default
    pub fn valence(&self, emotion: &str) -> f64 {
        let emotion = emotion.trim();
        self.valence_table
            .iter()
            .find(|(label, _)| label.eq_ignore_ascii_case(emotion))
            .map(|(_, v)| *v)
            .unwrap_or(self.default_valence)
    }

    pub fn validate(&self) -> Result<()> {
        self.engagement.validate("engagement")?;
        self.satisfaction.validate("satisfaction")?;
        self.trust.validate("trust")?;
        self.loyalty.validate("loyalty")?;
        self.opinion.validate("opinion")?;

        if !self.jitter_max.is_finite() || self.jitter_max < 0.0 {
            return Err(Error::Config(format!(
                "jitter_max must be a non-negative number, got {}",
                self.jitter_max
            )));
        }
        if self.loyalty_satisfaction_pct > 100 {
            return Err(Error::Config(format!(
                "loyalty_satisfaction_pct must be <= 100, got {}",
                self.loyalty_satisfaction_pct
            )));
        }
        if let Some((label, v)) = self
            .valence_table
            .iter()
            .find(|(_, v)| !(-1.0..=1.0).contains(v))
        {
            return Err(Error::Config(format!("valence for '{}' out of [-1, 1]: {}", label, v)));
        }
        Ok(())
    }
}

/// Source of the small random term added to engagement and trust
pub trait NoiseSource: Send {
    /// Uniform sample in [0, 1)
    fn sample(&mut self) -> f64;
}

/// Always zero: makes [`KpiEngine::compute`] deterministic
#[derive(Debug, Default, Clone, Copy)]
pub struct NoNoise;

impl NoiseSource for NoNoise {
    fn sample(&mut self) -> f64 {
        0.0
    }
}

/// Uniform noise from a seedable generator
#[derive(Debug, Clone)]
pub struct RandomNoise {
    rng: StdRng,
}

impl RandomNoise {
    pub fn seeded(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    pub fn from_entropy() -> Self {
        Self { rng: StdRng::from_entropy() }
    }
}

impl NoiseSource for RandomNoise {
    fn sample(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Clamp to [0, 100], truncating the fractional part
pub fn clamp0_100(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.trunc().clamp(0.0, 100.0) as u8
}

/// KPI values with their ladder labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KpiSnapshot {
    pub engagement: u8,
    pub satisfaction: u8,
    pub trust: u8,
    pub loyalty: u8,
    pub opinion: u8,
    #[serde(rename = "lbl_eng")]
    pub engagement_label: String,
    #[serde(rename = "lbl_sat")]
    pub satisfaction_label: String,
    #[serde(rename = "lbl_tru")]
    pub trust_label: String,
    #[serde(rename = "lbl_loy")]
    pub loyalty_label: String,
    #[serde(rename = "lbl_opi")]
    pub opinion_label: String,
}

/// Stateless KPI calculator
#[derive(Debug, Clone, Copy, Default)]
pub struct KpiEngine {
    policy: KpiPolicy,
}

impl KpiEngine {
    pub fn new(policy: KpiPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &KpiPolicy {
        &self.policy
    }

    fn jitter(&self, noise: &mut dyn NoiseSource) -> f64 {
        noise.sample().clamp(0.0, 1.0) * self.policy.jitter_max
    }

    /// Derive the five indicators from a classification
    ///
    /// `confidence_score` is on the classifier's 0-100 scale. Unrecognized
    /// emotions fall back to the neutral valence.
    pub fn compute(
        &self,
        emotion: &str,
        confidence_score: f64,
        noise: &mut dyn NoiseSource,
    ) -> KpiSnapshot {
        let p = &self.policy;
        let valence = p.valence(emotion);
        let arousal = if confidence_score.is_finite() {
            (confidence_score / 100.0).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let engagement = clamp0_100(arousal * 100.0 + self.jitter(noise));
        let satisfaction = clamp0_100(50.0 * (valence + 1.0));

        let trust_gain = if valence > 0.0 {
            p.trust_positive_gain
        } else {
            p.trust_negative_gain
        };
        let trust = clamp0_100(p.trust_base + valence * trust_gain + self.jitter(noise));

        let sat_pct = p.loyalty_satisfaction_pct.min(100);
        // Weighted mean in hundredths, truncated like clamp0_100
        let loyalty_raw =
            (sat_pct * u32::from(satisfaction) + (100 - sat_pct) * u32::from(trust)) / 100;
        let loyalty = loyalty_raw.min(100) as u8;

        // Opinion tracks satisfaction by definition
        let opinion = satisfaction;

        KpiSnapshot {
            engagement,
            satisfaction,
            trust,
            loyalty,
            opinion,
            engagement_label: p.engagement.label(engagement).to_string(),
            satisfaction_label: p.satisfaction.label(satisfaction).to_string(),
            trust_label: p.trust.label(trust).to_string(),
            loyalty_label: p.loyalty.label(loyalty).to_string(),
            opinion_label: p.opinion.label(opinion).to_string(),
        }
    }
}
