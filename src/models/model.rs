//! Detection-model capabilities and the runner that fans a stream out to them.
//!
//! Every model is a `PhaseClassifier`. Models that can also flag whole events
//! expose that through `event_detector()`; callers ask for the capability
//! instead of inspecting concrete types.

use tracing::{debug, info, warn};

use crate::domain::{Detection, Device, Pick, Stream};
use crate::error::ModelError;
use crate::models::builtin;

/// Confidence thresholds for the two phase classes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseThresholds {
    pub p: f64,
    pub s: f64,
}

impl PhaseThresholds {
    pub fn uniform(value: f64) -> Self {
        Self { p: value, s: value }
    }
}

/// Phase-level inference: discrete picks and continuous probabilities.
///
/// Implementations must not keep state between calls; one instance is shared
/// read-only across every file and filter of a run.
pub trait PhaseClassifier: Send + Sync {
    fn name(&self) -> &str;

    /// Sensitivity used when a slot does not configure explicit thresholds.
    fn default_thresholds(&self) -> PhaseThresholds;

    fn classify(&self, stream: &Stream, thresholds: &PhaseThresholds) -> Result<Vec<Pick>, ModelError>;

    /// Per-sample class probabilities aligned in time with `stream`.
    ///
    /// Output channels are named `{model}_{class}`; class `N` is noise.
    fn annotate(&self, stream: &Stream) -> Result<Stream, ModelError>;

    fn event_detector(&self) -> Option<&dyn EventDetector> {
        None
    }
}

/// Event-level inference.
pub trait EventDetector: Send + Sync {
    fn detect(&self, stream: &Stream) -> Result<Vec<Detection>, ModelError>;
}

/// One configured model: the classifier plus the thresholds it runs with.
pub struct ModelSlot {
    pub model: Box<dyn PhaseClassifier>,
    /// `None` runs the model at its default sensitivity.
    pub thresholds: Option<PhaseThresholds>,
}

impl ModelSlot {
    pub fn new(model: Box<dyn PhaseClassifier>, thresholds: Option<PhaseThresholds>) -> Self {
        Self { model, thresholds }
    }

    pub fn effective_thresholds(&self) -> PhaseThresholds {
        self.thresholds.unwrap_or_else(|| self.model.default_thresholds())
    }
}

/// Models loaded once per run, in a fixed order.
pub struct ModelSet {
    dataset: String,
    device: Device,
    slots: Vec<ModelSlot>,
}

impl std::fmt::Debug for ModelSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSet")
            .field("dataset", &self.dataset)
            .field("device", &self.device)
            .field("models", &self.names())
            .finish()
    }
}

impl ModelSet {
    /// Load the three pretrained slots for `dataset`.
    ///
    /// Falls back to CPU when `preferred` is not available to the backend.
    pub fn load(dataset: &str, preferred: Device) -> Result<Self, ModelError> {
        let device = if builtin::supports(preferred) {
            preferred
        } else {
            warn!(preferred = %preferred, "device unavailable, running models on cpu");
            Device::Cpu
        };

        let slots = builtin::pretrained(dataset)?;
        let set = Self {
            dataset: dataset.to_string(),
            device,
            slots,
        };
        info!(dataset, device = %device, models = ?set.names(), "models loaded");
        Ok(set)
    }

    /// Assemble a set from already constructed slots.
    pub fn from_slots(dataset: impl Into<String>, device: Device, slots: Vec<ModelSlot>) -> Self {
        Self {
            dataset: dataset.into(),
            device,
            slots,
        }
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn slots(&self) -> &[ModelSlot] {
        &self.slots
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.model.name().to_string()).collect()
    }

    /// Names of the models with event-level detection capability.
    pub fn detector_names(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter(|s| s.model.event_detector().is_some())
            .map(|s| s.model.name().to_string())
            .collect()
    }
}

/// Discrete output of one model on one variant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelEvents {
    pub model: String,
    pub picks: Vec<Pick>,
    /// Empty for models without event detection.
    pub detections: Vec<Detection>,
    pub has_detector: bool,
}

/// Probability streams of one model on one variant.
#[derive(Debug, Clone)]
pub struct ModelAnnotation {
    pub model: String,
    pub stream: Stream,
}

/// Run discrete inference of every model, in slot order.
pub fn detect(stream: &Stream, models: &ModelSet) -> Result<Vec<ModelEvents>, ModelError> {
    let mut out = Vec::with_capacity(models.slots.len());
    for slot in &models.slots {
        let name = slot.model.name().to_string();
        let picks = slot.model.classify(stream, &slot.effective_thresholds())?;

        let detector = slot.model.event_detector();
        let detections = match detector {
            Some(d) => d.detect(stream)?,
            None => Vec::new(),
        };

        debug!(model = %name, picks = picks.len(), detections = detections.len(), "classified");
        out.push(ModelEvents {
            model: name,
            picks,
            detections,
            has_detector: detector.is_some(),
        });
    }
    Ok(out)
}

/// Run continuous inference of every model, in slot order.
pub fn annotate(stream: &Stream, models: &ModelSet) -> Result<Vec<ModelAnnotation>, ModelError> {
    models
        .slots
        .iter()
        .map(|slot| {
            Ok(ModelAnnotation {
                model: slot.model.name().to_string(),
                stream: slot.model.annotate(stream)?,
            })
        })
        .collect()
}

/// Split an annotation channel (`PhaseNet_P`) into model and class.
///
/// Channels that do not have exactly one `_` yield an empty class.
pub fn split_annotation_channel(channel: &str) -> (&str, &str) {
    let mut parts = channel.split('_');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(model), Some(class), None) => (model, class),
        _ => (channel, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::time::parse_iso;
    use crate::domain::{Trace, TraceId};

    struct Silent {
        name: &'static str,
    }

    impl PhaseClassifier for Silent {
        fn name(&self) -> &str {
            self.name
        }
        fn default_thresholds(&self) -> PhaseThresholds {
            PhaseThresholds::uniform(0.3)
        }
        fn classify(&self, _: &Stream, _: &PhaseThresholds) -> Result<Vec<Pick>, ModelError> {
            Ok(Vec::new())
        }
        fn annotate(&self, stream: &Stream) -> Result<Stream, ModelError> {
            Ok(stream.clone())
        }
    }

    fn stream() -> Stream {
        Stream::new(vec![Trace::new(
            TraceId::new("XX", "STA", "", "HHZ"),
            parse_iso("2024-01-01T00:00:00").unwrap(),
            10.0,
            vec![0.0; 50],
        )])
    }

    #[test]
    fn missing_detector_yields_empty_detections() {
        let set = ModelSet::from_slots(
            "test",
            Device::Cpu,
            vec![ModelSlot::new(Box::new(Silent { name: "A" }), None)],
        );
        let events = detect(&stream(), &set).unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].detections.is_empty());
        assert!(!events[0].has_detector);
        assert!(set.detector_names().is_empty());
    }

    #[test]
    fn explicit_thresholds_override_defaults() {
        let slot = ModelSlot::new(Box::new(Silent { name: "A" }), Some(PhaseThresholds::uniform(0.75)));
        assert_eq!(slot.effective_thresholds().p, 0.75);
        let slot = ModelSlot::new(Box::new(Silent { name: "A" }), None);
        assert_eq!(slot.effective_thresholds().s, 0.3);
    }

    #[test]
    fn annotation_channel_split() {
        assert_eq!(split_annotation_channel("PhaseNet_P"), ("PhaseNet", "P"));
        assert_eq!(split_annotation_channel("EQTransformer_Detection"), ("EQTransformer", "Detection"));
        assert_eq!(split_annotation_channel("HHZ"), ("HHZ", ""));
        assert_eq!(split_annotation_channel("a_b_c"), ("a_b_c", ""));
    }

    #[test]
    fn cuda_falls_back_to_cpu() {
        let set = ModelSet::load("stead", Device::Cuda).unwrap();
        assert_eq!(set.device(), Device::Cpu);
        assert_eq!(set.names(), vec!["PhaseNet", "EQTransformer", "GPD"]);
        assert_eq!(set.detector_names(), vec!["EQTransformer"]);
    }

    #[test]
    fn unknown_dataset_is_fatal() {
        assert!(matches!(
            ModelSet::load("not-a-dataset", Device::Cpu),
            Err(ModelError::UnknownDataset(_))
        ));
    }
}
