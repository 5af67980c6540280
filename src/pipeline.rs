use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use image::DynamicImage;

use crate::effects::{EffectKind, ParamSet, normalize};
use crate::history::{DEFAULT_MAX_HISTORY, History};

/// One configured step of a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectInstance {
    pub kind: EffectKind,
    pub params: ParamSet,
    pub enabled: bool,
}

impl EffectInstance {
    pub fn new(kind: EffectKind, params: ParamSet) -> Self {
        Self {
            kind,
            params,
            enabled: true,
        }
    }
}

/// Ordered list of effect instances with snapshot-based undo/redo.
///
/// Every successful mutation records a copy of the whole list. Calls with an
/// out-of-range index change nothing and record nothing.
#[derive(Debug, Clone)]
pub struct Pipeline {
    effects: Vec<EffectInstance>,
    history: History<Vec<EffectInstance>>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::with_max_history(DEFAULT_MAX_HISTORY)
    }

    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            effects: Vec::new(),
            history: History::new(Vec::new(), max_history),
        }
    }

    pub fn effects(&self) -> &[EffectInstance] {
        &self.effects
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Appends an enabled instance and returns its index.
    pub fn add(&mut self, kind: EffectKind, params: ParamSet) -> usize {
        self.effects.push(EffectInstance::new(kind, params));
        self.snapshot();
        self.effects.len() - 1
    }

    pub fn add_default(&mut self, kind: EffectKind) -> usize {
        self.add(kind, kind.default_params())
    }

    pub fn remove(&mut self, index: usize) {
        if index < self.effects.len() {
            self.effects.remove(index);
            self.snapshot();
        }
    }

    pub fn set_enabled(&mut self, index: usize, enabled: bool) {
        if let Some(instance) = self.effects.get_mut(index) {
            instance.enabled = enabled;
            self.snapshot();
        }
    }

    pub fn update_params(&mut self, index: usize, params: ParamSet) {
        if let Some(instance) = self.effects.get_mut(index) {
            instance.params = params;
            self.snapshot();
        }
    }

    /// Removes the instance at `from` and reinserts it at `to`. Both indices
    /// must refer to existing instances.
    pub fn move_effect(&mut self, from: usize, to: usize) {
        let len = self.effects.len();
        if from < len && to < len {
            let instance = self.effects.remove(from);
            self.effects.insert(to, instance);
            self.snapshot();
        }
    }

    pub fn clear(&mut self) {
        self.effects.clear();
        self.snapshot();
    }

    /// Swaps in a whole new list and restarts history from it.
    pub fn replace_effects(&mut self, effects: Vec<EffectInstance>) {
        self.effects = effects;
        self.history.reset(self.effects.clone());
    }

    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(snapshot) => {
                self.effects = snapshot.clone();
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(snapshot) => {
                self.effects = snapshot.clone();
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    fn snapshot(&mut self) {
        self.history.record(self.effects.clone());
    }

    /// Runs every enabled instance in order over a copy of `img`.
    ///
    /// A step that fails is logged and skipped; its input flows on to the
    /// next step unchanged.
    pub fn apply(&self, img: &DynamicImage) -> DynamicImage {
        let mut current = normalize(img.clone());
        for (index, instance) in self.effects.iter().enumerate() {
            if !instance.enabled {
                continue;
            }
            let started = Instant::now();
            if let Some(out) = run_isolated(instance.kind.identifier(), index, || {
                instance.kind.apply(&current, &instance.params)
            }) {
                current = out;
            }
            tracing::debug!(
                step = index,
                effect = instance.kind.identifier(),
                elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
                "applied effect"
            );
        }
        current
    }
}

/// Runs one step, turning both errors and panics into `None`.
fn run_isolated<F>(effect: &str, index: usize, step: F) -> Option<DynamicImage>
where
    F: FnOnce() -> anyhow::Result<DynamicImage>,
{
    match panic::catch_unwind(AssertUnwindSafe(step)) {
        Ok(Ok(img)) => Some(img),
        Ok(Err(err)) => {
            tracing::error!(step = index, effect, "effect failed: {err:#}");
            None
        }
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(step = index, effect, "effect panicked: {reason}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb, RgbaImage};

    use super::{Pipeline, run_isolated};
    use crate::effects::{EffectKind, ParamSet};

    fn mid_gray() -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(100, 100, Rgb([128, 128, 128])))
    }

    fn pattern() -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(48, 32, |x, y| {
            Rgb([(x * 5) as u8, (y * 7) as u8, (x ^ y) as u8])
        }))
    }

    fn populated() -> Pipeline {
        let mut p = Pipeline::new();
        p.add_default(EffectKind::Warp);
        p.add_default(EffectKind::Posterize);
        p.add(
            EffectKind::BlockShuffle,
            ParamSet::new().with("block_size", 8).with("shuffle_strength", 0.5),
        );
        p
    }

    #[test]
    fn first_mutation_is_undoable() {
        let mut p = Pipeline::new();
        assert!(!p.can_undo());
        p.add_default(EffectKind::Crop);
        assert!(p.can_undo());
        assert!(p.undo());
        assert!(p.is_empty());
        assert!(!p.undo());
    }

    #[test]
    fn undo_restores_previous_list_and_redo_reapplies() {
        let mut p = populated();
        let before = p.effects().to_vec();
        p.update_params(1, ParamSet::new().with("levels", 3));
        let after = p.effects().to_vec();

        assert!(p.undo());
        assert_eq!(p.effects(), before.as_slice());
        assert!(p.redo());
        assert_eq!(p.effects(), after.as_slice());
        assert!(!p.redo());
    }

    #[test]
    fn mutation_after_undo_truncates_redo() {
        let mut p = populated();
        p.undo();
        p.undo();
        assert!(p.can_redo());
        p.set_enabled(0, false);
        assert!(!p.redo());
    }

    #[test]
    fn invalid_indices_are_silent_noops() {
        let mut p = populated();
        let before = p.effects().to_vec();
        p.remove(3);
        p.set_enabled(10, false);
        p.update_params(3, ParamSet::new());
        p.move_effect(0, 3);
        assert_eq!(p.effects(), before.as_slice());
        assert!(p.undo());
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn move_effect_reorders() {
        let mut p = populated();
        p.move_effect(0, 2);
        let kinds: Vec<EffectKind> = p.effects().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EffectKind::Posterize, EffectKind::BlockShuffle, EffectKind::Warp]
        );
    }

    #[test]
    fn history_cap_evicts_oldest() {
        let mut p = Pipeline::with_max_history(3);
        for _ in 0..5 {
            p.add_default(EffectKind::Grain);
        }
        assert!(p.undo());
        assert!(p.undo());
        assert!(!p.undo());
        assert_eq!(p.len(), 3);
    }

    #[test]
    fn replace_effects_resets_history() {
        let mut p = populated();
        let list = p.effects()[..1].to_vec();
        p.replace_effects(list.clone());
        assert_eq!(p.effects(), list.as_slice());
        assert!(!p.can_undo());
        assert!(!p.can_redo());
    }

    #[test]
    fn clear_is_undoable() {
        let mut p = populated();
        p.clear();
        assert!(p.is_empty());
        assert!(p.undo());
        assert_eq!(p.len(), 3);
    }

    #[test]
    fn disabled_step_contributes_nothing() {
        let img = pattern();
        let mut with = populated();
        with.add_default(EffectKind::Grain);
        with.set_enabled(3, false);
        let without = populated();
        assert_eq!(with.apply(&img), without.apply(&img));
    }

    #[test]
    fn apply_is_deterministic_and_leaves_input_alone() {
        let img = pattern();
        let copy = img.clone();
        let p = populated();
        let a = p.apply(&img);
        assert_eq!(a, p.apply(&img));
        assert_eq!(img, copy);
    }

    #[test]
    fn neutral_curves_keep_mid_gray() {
        let mut p = Pipeline::new();
        p.add(
            EffectKind::RgbCurves,
            ParamSet::new()
                .with("contrast", 0)
                .with("gamma", 1.0)
                .with("exposure", 0.0),
        );
        assert_eq!(p.apply(&mid_gray()), mid_gray());
    }

    #[test]
    fn two_level_posterize_drops_mid_gray_to_black() {
        let mut p = Pipeline::new();
        p.add(
            EffectKind::Posterize,
            ParamSet::new().with("levels", 2).with("dither", false),
        );
        let out = p.apply(&mid_gray()).to_rgb8();
        assert!(out.as_raw().iter().all(|&v| v == 0));
    }

    #[test]
    fn input_is_normalized_before_the_first_step() {
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, image::Rgba([9, 8, 7, 0])));
        assert!(matches!(Pipeline::new().apply(&rgba), DynamicImage::ImageRgb8(_)));

        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([3])));
        let mut p = Pipeline::new();
        p.add_default(EffectKind::HsvAdjust);
        assert!(matches!(p.apply(&gray), DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn failing_steps_are_isolated() {
        assert!(run_isolated("Broken", 0, || anyhow::bail!("boom")).is_none());
        assert!(run_isolated("Panicky", 1, || panic!("kaboom")).is_none());
        let ok = run_isolated("Fine", 2, || Ok(mid_gray()));
        assert_eq!(ok, Some(mid_gray()));
    }
}
