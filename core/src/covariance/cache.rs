use crate::covariance::estimators::EstimatorKind;
use crate::covariance::model::{CovarianceModel, TrainingCorpus};
use crate::prelude::{DetectError, DetectResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CorpusRole {
    Signal,
    Noise,
}

type CacheKey = (EstimatorKind, String, CorpusRole);

/// Shares trained models across every kernel and window of a recording.
/// Models are immutable once built, so readers only hold an `Arc`.
#[derive(Default)]
pub struct ModelCache {
    models: Mutex<HashMap<CacheKey, Arc<CovarianceModel>>>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_train(
        &self,
        estimator: EstimatorKind,
        corpus: &TrainingCorpus,
        role: CorpusRole,
    ) -> DetectResult<Arc<CovarianceModel>> {
        let key = (estimator, corpus.id.clone(), role);
        if let Some(model) = self.lock()?.get(&key) {
            return Ok(model.clone());
        }

        let observations = match role {
            CorpusRole::Signal => corpus.signal.view(),
            CorpusRole::Noise => corpus
                .noise
                .as_ref()
                .ok_or_else(|| {
                    DetectError::ConfigurationInvalid(format!(
                        "training corpus {} has no noise observations",
                        corpus.id
                    ))
                })?
                .view(),
        };
        let model = Arc::new(CovarianceModel::train(estimator, observations)?);
        self.lock()?.entry(key).or_insert_with(|| model.clone());
        Ok(model)
    }

    pub fn len(&self) -> usize {
        self.models.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(
        &self,
    ) -> DetectResult<std::sync::MutexGuard<'_, HashMap<CacheKey, Arc<CovarianceModel>>>> {
        self.models
            .lock()
            .map_err(|_| DetectError::RuntimeDetectionFailure("model cache poisoned".into()))
    }
}
