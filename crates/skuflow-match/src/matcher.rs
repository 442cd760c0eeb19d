// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Weighted SKU scoring with a three-tier carrier fallback.
//!
//! Brand is a hard gate. Every surviving candidate gets a structural score
//! from model, storage and color. Only candidates whose model agrees at least
//! partially can be accepted; the carrier tiers are tried over those in order:
//!
//! 1. exact carrier (full carrier weight), method `exact`;
//! 2. unlocked SKUs (carrier weight times `unlocked_factor`), method `unlocked_fallback`;
//! 3. any carrier with no carrier credit, method `carrier_mismatch_fallback`.
//!
//! The first tier whose best candidate reaches the threshold wins. Within a
//! tier candidates rank by score, then shortest `sku_code`, then lexicographically.

use std::cmp::Ordering;

use skuflow_config::model::MatchingConfig;
use skuflow_core::error::SkuflowError;
use skuflow_core::types::{DeviceRecord, MatchMethod, MatchResult, SkuCatalogEntry};

use crate::attributes::{
    carrier_key, compare_models, model_key, same_color, same_storage, squash, storage_bytes,
    ModelAgreement,
};

/// Scoring weights and thresholds, usually taken from `[matching]` config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchWeights {
    pub model: f64,
    pub storage: f64,
    pub color: f64,
    pub carrier: f64,
    pub partial_model_credit: f64,
    pub unlocked_factor: f64,
    pub threshold: f64,
}

impl From<&MatchingConfig> for MatchWeights {
    fn from(config: &MatchingConfig) -> Self {
        Self {
            model: config.model_weight,
            storage: config.storage_weight,
            color: config.color_weight,
            carrier: config.carrier_weight,
            partial_model_credit: config.partial_model_credit,
            unlocked_factor: config.unlocked_factor,
            threshold: config.threshold,
        }
    }
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self::from(&MatchingConfig::default())
    }
}

/// How a candidate's carrier relates to the device's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CarrierFit {
    Exact,
    Unlocked,
    Other,
}

/// One brand-matching catalog entry with its per-field outcomes.
#[derive(Debug)]
struct Candidate<'a> {
    entry: &'a SkuCatalogEntry,
    /// Model + storage + color contribution.
    structural: f64,
    model: ModelAgreement,
    storage_hit: bool,
    color_hit: bool,
    carrier: CarrierFit,
}

/// Pure, deterministic SKU matcher.
#[derive(Debug, Clone, Default)]
pub struct SkuMatcher {
    weights: MatchWeights,
}

impl SkuMatcher {
    pub fn new(config: &MatchingConfig) -> Self {
        Self::with_weights(MatchWeights::from(config))
    }

    pub fn with_weights(weights: MatchWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &MatchWeights {
        &self.weights
    }

    /// Match one device against a catalog snapshot.
    ///
    /// Returns an unmatched result (never an error) when nothing reaches the
    /// threshold. The only error is [`SkuflowError::AmbiguousReference`]: the
    /// winning tier's top two candidates share a score and a `sku_code` but
    /// describe different devices, so no tie-break can choose between them.
    pub fn match_device(
        &self,
        device: &DeviceRecord,
        catalog: &[SkuCatalogEntry],
    ) -> Result<MatchResult, SkuflowError> {
        let w = &self.weights;
        let brand = squash(&device.brand);
        let device_model = model_key(&device.brand, &device.model);
        let device_carrier = device
            .carrier
            .as_deref()
            .map(carrier_key)
            .filter(|c| !c.is_empty());

        let candidates: Vec<Candidate<'_>> = catalog
            .iter()
            .filter(|entry| entry.is_active)
            .filter(|entry| !brand.is_empty() && squash(&entry.brand) == brand)
            .map(|entry| self.score(device, &device_model, device_carrier.as_deref(), entry))
            .collect();

        if candidates.is_empty() {
            return Ok(MatchResult::unmatched(
                0.0,
                format!("no viable candidate for: brand ({})", device.brand),
            ));
        }

        let viable: Vec<&Candidate<'_>> = candidates
            .iter()
            .filter(|c| c.model != ModelAgreement::None)
            .collect();

        let exact = rank(
            viable
                .iter()
                .filter(|c| c.carrier == CarrierFit::Exact)
                .map(|c| (*c, c.structural + w.carrier)),
        );
        if let Some(result) = self.accept(&exact, MatchMethod::Exact, device)? {
            return Ok(result);
        }

        let unlocked = rank(
            viable
                .iter()
                .filter(|c| c.carrier == CarrierFit::Unlocked)
                .map(|c| (*c, c.structural + w.carrier * w.unlocked_factor)),
        );
        if let Some(result) = self.accept(&unlocked, MatchMethod::UnlockedFallback, device)? {
            return Ok(result);
        }

        let any = rank(viable.iter().map(|c| (*c, c.structural)));
        if let Some(result) = self.accept(&any, MatchMethod::CarrierMismatchFallback, device)? {
            return Ok(result);
        }

        let best = exact
            .first()
            .into_iter()
            .chain(unlocked.first())
            .chain(any.first())
            .map(|(_, score)| *score)
            .fold(0.0_f64, f64::max);
        Ok(MatchResult::unmatched(
            best,
            self.unmatched_notes(device, &candidates, best),
        ))
    }

    fn score<'a>(
        &self,
        device: &DeviceRecord,
        device_model: &str,
        device_carrier: Option<&str>,
        entry: &'a SkuCatalogEntry,
    ) -> Candidate<'a> {
        let w = &self.weights;

        let model = compare_models(device_model, &model_key(&entry.brand, &entry.model));
        let storage_hit = matches!(
            (device.storage.as_deref(), entry.storage.as_deref()),
            (Some(d), Some(e)) if same_storage(d, e)
        );
        let color_hit = matches!(
            (device.color.as_deref(), entry.color.as_deref()),
            (Some(d), Some(e)) if same_color(d, e)
        );

        let mut structural = match model {
            ModelAgreement::Exact => w.model,
            ModelAgreement::Partial => w.model * w.partial_model_credit,
            ModelAgreement::None => 0.0,
        };
        if storage_hit {
            structural += w.storage;
        }
        if color_hit {
            structural += w.color;
        }

        let entry_carrier = entry
            .carrier
            .as_deref()
            .map(carrier_key)
            .filter(|c| !c.is_empty())
            .or_else(|| entry.is_unlocked.then(|| "unlocked".to_string()));
        let carrier = match (device_carrier, entry_carrier.as_deref()) {
            (Some(d), Some(e)) if d == e => CarrierFit::Exact,
            _ if entry.is_unlocked => CarrierFit::Unlocked,
            _ => CarrierFit::Other,
        };

        Candidate {
            entry,
            structural,
            model,
            storage_hit,
            color_hit,
            carrier,
        }
    }

    /// Turn a tier's ranking into a result if its leader reaches the threshold.
    fn accept(
        &self,
        ranked: &[(&Candidate<'_>, f64)],
        method: MatchMethod,
        device: &DeviceRecord,
    ) -> Result<Option<MatchResult>, SkuflowError> {
        let Some(&(leader, score)) = ranked.first() else {
            return Ok(None);
        };
        if score < self.weights.threshold {
            return Ok(None);
        }

        // Rows tied with the leader on both score and code cannot be told
        // apart; they must at least describe the same configuration.
        let leader_key = structural_key(leader.entry);
        if let Some(&(conflict, _)) = ranked
            .iter()
            .skip(1)
            .take_while(|(c, s)| {
                s.total_cmp(&score) == Ordering::Equal && c.entry.sku_code == leader.entry.sku_code
            })
            .find(|(c, _)| structural_key(c.entry) != leader_key)
        {
            return Err(SkuflowError::AmbiguousReference {
                detail: format!(
                    "catalog lists sku {} more than once with different attributes ({} vs {}), all scoring {score:.3}",
                    leader.entry.sku_code,
                    describe(leader.entry),
                    describe(conflict.entry),
                ),
            });
        }

        let entry = leader.entry;
        let mut notes = match method {
            MatchMethod::Exact => "exact carrier match".to_string(),
            MatchMethod::UnlockedFallback => format!(
                "no {} sku reached the threshold; unlocked sku accepted",
                device.carrier.as_deref().unwrap_or("carrier-specific")
            ),
            MatchMethod::CarrierMismatchFallback | MatchMethod::Unmatched => format!(
                "carrier mismatch: device {} vs sku {}",
                device.carrier.as_deref().unwrap_or("none"),
                entry.carrier.as_deref().unwrap_or("none"),
            ),
        };
        if leader.model == ModelAgreement::Partial {
            notes.push_str("; partial model match");
        }
        let misses = [
            (!leader.storage_hit)
                .then(|| format!("storage ({})", device.storage.as_deref().unwrap_or("not reported"))),
            (!leader.color_hit)
                .then(|| format!("color ({})", device.color.as_deref().unwrap_or("not reported"))),
        ];
        let misses: Vec<String> = misses.into_iter().flatten().collect();
        if !misses.is_empty() {
            notes.push_str(&format!("; no match on: {}", misses.join(", ")));
        }
        let base = entry.base_code();
        if base != entry.sku_code {
            notes.push_str(&format!("; grade suffix ignored (base {base})"));
        }

        Ok(Some(MatchResult {
            sku_code: Some(entry.sku_code.clone()),
            score,
            method,
            notes,
        }))
    }

    fn unmatched_notes(&self, device: &DeviceRecord, candidates: &[Candidate<'_>], best: f64) -> String {
        let mut missing = Vec::new();
        if candidates.iter().all(|c| c.model == ModelAgreement::None) {
            missing.push(format!("model ({})", device.model));
        }
        if !candidates.iter().any(|c| c.storage_hit) {
            missing.push(format!("storage ({})", device.storage.as_deref().unwrap_or("not reported")));
        }
        if !candidates.iter().any(|c| c.color_hit) {
            missing.push(format!("color ({})", device.color.as_deref().unwrap_or("not reported")));
        }
        if candidates.iter().all(|c| c.carrier == CarrierFit::Other) {
            missing.push(format!("carrier ({})", device.carrier.as_deref().unwrap_or("not reported")));
        }

        let summary = format!(
            "best score {best:.3} below threshold {:.3}",
            self.weights.threshold
        );
        if missing.is_empty() {
            format!("no single candidate combines enough matching fields; {summary}")
        } else {
            format!("no viable candidate for: {}; {summary}", missing.join(", "))
        }
    }
}

/// Sort by score descending, then shortest `sku_code`, then lexicographic.
fn rank<'c, 'a>(
    scored: impl Iterator<Item = (&'c Candidate<'a>, f64)>,
) -> Vec<(&'c Candidate<'a>, f64)> {
    let mut ranked: Vec<_> = scored.collect();
    ranked.sort_by(|(a, sa), (b, sb)| {
        sb.total_cmp(sa)
            .then_with(|| a.entry.sku_code.len().cmp(&b.entry.sku_code.len()))
            .then_with(|| a.entry.sku_code.cmp(&b.entry.sku_code))
    });
    ranked
}

/// The attributes that identify a sellable configuration.
fn structural_key(entry: &SkuCatalogEntry) -> (String, String, String, String, bool) {
    let storage = entry
        .storage
        .as_deref()
        .map(|s| storage_bytes(s).map_or_else(|| squash(s), |b| b.to_string()))
        .unwrap_or_default();
    (
        model_key(&entry.brand, &entry.model),
        storage,
        entry.color.as_deref().map(squash).unwrap_or_default(),
        entry.carrier.as_deref().map(carrier_key).unwrap_or_default(),
        entry.is_unlocked,
    )
}

fn describe(entry: &SkuCatalogEntry) -> String {
    [
        Some(entry.model.as_str()),
        entry.storage.as_deref(),
        entry.color.as_deref(),
        entry.carrier.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join("/")
}
