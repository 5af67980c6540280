//! Preset records: the serializable form of a pipeline.

use std::path::Path;

use anyhow::Context;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::effects::{Catalog, EffectKind, ParamSet};
use crate::pipeline::{EffectInstance, Pipeline};

pub const PRESET_VERSION: &str = "1.0";

const MAX_RANDOM_EFFECTS: usize = 3;
const MAX_EFFECT_SEED: u64 = (1 << 31) - 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectRecord {
    #[serde(rename = "class")]
    pub identifier: String,
    #[serde(default)]
    pub params: ParamSet,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineRecord {
    #[serde(default)]
    pub effects: Vec<EffectRecord>,
}

#[derive(Serialize)]
struct PresetFile<'a> {
    version: &'a str,
    pipeline: &'a PipelineRecord,
}

pub fn encode(pipeline: &Pipeline) -> PipelineRecord {
    PipelineRecord {
        effects: pipeline
            .effects()
            .iter()
            .map(|e| EffectRecord {
                identifier: e.kind.identifier().to_string(),
                params: e.params.clone(),
                enabled: e.enabled,
            })
            .collect(),
    }
}

/// Builds a fresh pipeline from `record`. Records naming effects the catalog
/// does not know are skipped.
pub fn decode(record: &PipelineRecord, catalog: &Catalog) -> Pipeline {
    let mut pipeline = Pipeline::new();
    decode_into(&mut pipeline, record, catalog);
    pipeline
}

/// Replaces the contents of `pipeline` with `record`, resetting its history
/// but keeping its history cap.
pub fn decode_into(pipeline: &mut Pipeline, record: &PipelineRecord, catalog: &Catalog) {
    let effects = record
        .effects
        .iter()
        .filter_map(|r| match catalog.get(&r.identifier) {
            Some(kind) => Some(EffectInstance {
                kind,
                params: r.params.clone(),
                enabled: r.enabled,
            }),
            None => {
                tracing::warn!(class = %r.identifier, "skipping unknown effect in preset");
                None
            }
        })
        .collect();
    pipeline.replace_effects(effects);
}

/// Picks `count` distinct effects (1 to 3 when `None`) and randomizes each
/// from its defaults with its own seed.
pub fn random_preset<R>(catalog: &Catalog, count: Option<usize>, rng: &mut R) -> PipelineRecord
where
    R: Rng + ?Sized,
{
    let kinds: Vec<EffectKind> = catalog.iter().collect();
    let count = count
        .unwrap_or_else(|| rng.random_range(1..=MAX_RANDOM_EFFECTS))
        .min(kinds.len());

    let effects = index::sample(rng, kinds.len(), count)
        .into_iter()
        .map(|i| {
            let kind = kinds[i];
            let seed = rng.random_range(0..=MAX_EFFECT_SEED);
            EffectRecord {
                identifier: kind.identifier().to_string(),
                params: kind.randomize(&kind.default_params(), seed),
                enabled: true,
            }
        })
        .collect();
    PipelineRecord { effects }
}

pub fn random_preset_seeded(catalog: &Catalog, count: Option<usize>, seed: u64) -> PipelineRecord {
    let mut rng = StdRng::seed_from_u64(seed);
    random_preset(catalog, count, &mut rng)
}

/// Serializes `record` inside the versioned preset wrapper.
pub fn to_json(record: &PipelineRecord) -> anyhow::Result<String> {
    let file = PresetFile {
        version: PRESET_VERSION,
        pipeline: record,
    };
    Ok(serde_json::to_string_pretty(&file)?)
}

/// Parses a preset document. Both the versioned wrapper and a bare pipeline
/// object are accepted.
pub fn from_json(json: &str) -> Option<PipelineRecord> {
    let parsed = serde_json::from_str::<serde_json::Value>(json).and_then(|mut value| {
        let pipeline = match value.get_mut("pipeline").map(serde_json::Value::take) {
            Some(inner) => inner,
            None => value,
        };
        serde_json::from_value::<PipelineRecord>(pipeline)
    });
    match parsed {
        Ok(record) => Some(record),
        Err(err) => {
            tracing::warn!("invalid preset: {err}");
            None
        }
    }
}

pub fn save(record: &PipelineRecord, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = to_json(record)?;
    std::fs::write(path, json).with_context(|| format!("writing preset {}", path.display()))?;
    Ok(())
}

pub fn load(path: &Path) -> Option<PipelineRecord> {
    match std::fs::read_to_string(path) {
        Ok(json) => from_json(&json),
        Err(err) => {
            tracing::warn!(path = %path.display(), "cannot read preset: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::{
        EffectRecord, PipelineRecord, decode, decode_into, encode, from_json, load, random_preset,
        random_preset_seeded, save, to_json,
    };
    use crate::effects::{Catalog, EffectKind, ParamSet};
    use crate::pipeline::Pipeline;

    fn sample_pipeline() -> Pipeline {
        let mut p = Pipeline::new();
        p.add_default(EffectKind::ShiftRowsColumns);
        p.add(EffectKind::Posterize, ParamSet::new().with("levels", 4));
        p.add_default(EffectKind::SharpenBlur);
        p.set_enabled(1, false);
        p
    }

    #[test]
    fn encode_decode_preserves_order_params_and_flags() {
        let p = sample_pipeline();
        let back = decode(&encode(&p), &Catalog::builtin());
        assert_eq!(back.effects(), p.effects());
        assert!(!back.can_undo());
    }

    #[test]
    fn json_round_trip_uses_versioned_wrapper() {
        let record = encode(&sample_pipeline());
        let json = to_json(&record).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], "1.0");
        assert_eq!(value["pipeline"]["effects"][1]["class"], "Posterize");
        assert_eq!(value["pipeline"]["effects"][1]["enabled"], false);
        assert_eq!(from_json(&json), Some(record));
    }

    #[test]
    fn bare_pipeline_and_missing_fields_are_accepted() {
        let json = r#"{"effects":[{"class":"Crop"},{"class":"Grain","params":{"amount":0.5}}]}"#;
        let record = from_json(json).unwrap();
        assert_eq!(
            record.effects[0],
            EffectRecord {
                identifier: "Crop".into(),
                params: ParamSet::new(),
                enabled: true,
            }
        );
        assert_eq!(record.effects[1].params.float("amount", 0.0), 0.5);
    }

    #[test]
    fn odd_param_values_do_not_reject_the_preset() {
        let json = r#"{"version":"1.0","pipeline":{"effects":[
            {"class":"Posterize","params":{"levels":4,"palette":null,"stops":[1,2]}}
        ]}}"#;
        let record = from_json(json).unwrap();
        let p = decode(&record, &Catalog::builtin());
        assert_eq!(p.len(), 1);
        assert_eq!(p.effects()[0].params.int("levels", 8), 4);
        assert_eq!(p.effects()[0].params.len(), 3);
    }

    #[test]
    fn malformed_documents_yield_none() {
        assert_eq!(from_json("not json"), None);
        assert_eq!(from_json(r#"{"effects":[{"params":{}}]}"#), None);
        assert_eq!(from_json(r#"{"version":"1.0","pipeline":42}"#), None);
    }

    #[test]
    fn unknown_classes_are_skipped() {
        let record = PipelineRecord {
            effects: vec![
                EffectRecord {
                    identifier: "Vignette".into(),
                    params: ParamSet::new(),
                    enabled: true,
                },
                EffectRecord {
                    identifier: "Warp".into(),
                    params: ParamSet::new(),
                    enabled: true,
                },
            ],
        };
        let p = decode(&record, &Catalog::builtin());
        assert_eq!(p.len(), 1);
        assert_eq!(p.effects()[0].kind, EffectKind::Warp);

        let restricted = Catalog::from_kinds([EffectKind::Crop]);
        assert!(decode(&record, &restricted).is_empty());
    }

    #[test]
    fn decode_into_resets_existing_history() {
        let mut p = sample_pipeline();
        assert!(p.can_undo());
        decode_into(&mut p, &PipelineRecord::default(), &Catalog::builtin());
        assert!(p.is_empty());
        assert!(!p.can_undo());
    }

    #[test]
    fn random_presets_pick_distinct_effects() {
        let catalog = Catalog::builtin();
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..20 {
            let record = random_preset(&catalog, None, &mut rng);
            assert!((1..=3).contains(&record.effects.len()));
            let mut ids: Vec<&str> = record.effects.iter().map(|e| e.identifier.as_str()).collect();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), record.effects.len());
        }
        let all = random_preset(&catalog, Some(50), &mut rng);
        assert_eq!(all.effects.len(), catalog.len());
    }

    #[test]
    fn seeded_random_preset_is_reproducible() {
        let catalog = Catalog::builtin();
        assert_eq!(
            random_preset_seeded(&catalog, Some(2), 99),
            random_preset_seeded(&catalog, Some(2), 99)
        );
    }

    #[test]
    fn save_and_load_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("glitch.json");
        let record = random_preset_seeded(&Catalog::builtin(), Some(3), 1);
        save(&record, &path).unwrap();
        assert_eq!(load(&path), Some(record));
        assert_eq!(load(&dir.path().join("missing.json")), None);
    }
}
