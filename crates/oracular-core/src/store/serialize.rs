//! Model persistence and versioning on top of [`ArtifactStore`].
//!
//! Every persisted model owns a directory keyed `<ClassFQN>::<version>`
//! holding a `METAINFO.yaml` manifest, `stats.json`, `metrics.json`, and a
//! `model.json` blob when the model has serializable state. Oracles persist
//! recursively: teacher, students, and ensemblers each get their own
//! versioned directory, referenced from the oracle's stats under
//! `model_details`.
//!
//! Rule teachers carry opaque predicates and store no blob; loading one
//! resolves its class FQN through a [`ModelRegistry`] of constructors.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{OracleError, Result};
use crate::fuzzy::FuzzyController;
use crate::models::ensembler::{Ensembler, LearnedEnsembler, MajorityVoteEnsembler};
use crate::models::learners::MlpClassifier;
use crate::models::student::{Student, StudentLearner};
use crate::models::teacher::{FuzzyTeacher, RuleTeacher, TeacherModel};
use crate::namespace::{Namespace, NsValue};
use crate::oracle::Oracle;
use crate::store::ArtifactStore;

pub const ORACLE_FQN: &str = "oracular.oracle.Oracle";
pub const STUDENT_FQN: &str = "oracular.models.Student";
pub const ENSEMBLER_FQN: &str = "oracular.models.Ensembler";
pub const FUZZY_TEACHER_FQN: &str = "oracular.teacher.FuzzyTeacher";

const METAINFO_FILE: &str = "METAINFO.yaml";
const MODEL_FILE: &str = "model.json";
const STATS_FILE: &str = "stats.json";
const METRICS_FILE: &str = "metrics.json";

/// Mint a new artifact version: a UTC timestamp plus a short random tag.
/// Lexical order matches creation order at second granularity, so "latest"
/// is the maximum key.
pub fn mint_version() -> String {
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%3fZ");
    let tag: u16 = rand::thread_rng().gen();
    format!("{}-{:04x}", stamp, tag)
}

/// The concrete model kinds the store knows how to reconstruct.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BaseModelType {
    RuleTeacher,
    FuzzyTeacher,
    LogisticStudent,
    ForestStudent,
    MajorityVoteEnsembler,
    LearnedEnsembler,
    Oracle,
}

/// Manifest written alongside every persisted model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metainfo {
    pub class_fqn: String,
    pub version: String,
    pub model_type: BaseModelType,
    pub created_at: String,
    pub files: Vec<String>,
}

/// Constructors for rule teachers, keyed by class FQN. Needed because rule
/// predicates are code, not data.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    factories: BTreeMap<String, Arc<dyn Fn() -> RuleTeacher + Send + Sync>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        ModelRegistry::default()
    }

    pub fn register<F>(&mut self, class_fqn: &str, factory: F)
    where
        F: Fn() -> RuleTeacher + Send + Sync + 'static,
    {
        self.factories
            .insert(class_fqn.to_string(), Arc::new(factory));
    }

    pub fn construct(&self, class_fqn: &str) -> Result<RuleTeacher> {
        let factory = self.factories.get(class_fqn).ok_or_else(|| {
            OracleError::Config(format!(
                "no constructor registered for teacher class '{}'",
                class_fqn
            ))
        })?;
        Ok(factory().with_class_fqn(class_fqn))
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("classes", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Persists and loads models through an artifact store, under an optional
/// key prefix.
pub struct ModelStore {
    store: Box<dyn ArtifactStore>,
    prefix: String,
    registry: ModelRegistry,
}

impl ModelStore {
    pub fn new(store: Box<dyn ArtifactStore>) -> Self {
        ModelStore {
            store,
            prefix: String::new(),
            registry: ModelRegistry::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.trim_matches('/').to_string();
        self
    }

    pub fn with_registry(mut self, registry: ModelRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry_mut(&mut self) -> &mut ModelRegistry {
        &mut self.registry
    }

    fn dir(&self, class_fqn: &str, version: &str) -> String {
        if self.prefix.is_empty() {
            format!("{}::{}", class_fqn, version)
        } else {
            format!("{}/{}::{}", self.prefix, class_fqn, version)
        }
    }

    fn key(&self, class_fqn: &str, version: &str, file: &str) -> String {
        format!("{}/{}", self.dir(class_fqn, version), file)
    }

    fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.store.put(key, &serde_json::to_vec_pretty(value)?)
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        Ok(serde_json::from_slice(&self.store.get(key)?)?)
    }

    /// All persisted versions of `class_fqn`, sorted ascending.
    pub fn versions(&self, class_fqn: &str) -> Result<Vec<String>> {
        let needle = if self.prefix.is_empty() {
            format!("{}::", class_fqn)
        } else {
            format!("{}/{}::", self.prefix, class_fqn)
        };
        let mut versions: Vec<String> = self
            .store
            .list(&needle)?
            .into_iter()
            .filter_map(|key| {
                let rest = key.strip_prefix(&needle)?;
                Some(rest.split('/').next()?.to_string())
            })
            .collect();
        versions.sort();
        versions.dedup();
        Ok(versions)
    }

    pub fn latest(&self, class_fqn: &str) -> Result<String> {
        self.versions(class_fqn)?
            .pop()
            .ok_or_else(|| OracleError::ArtifactMissing(class_fqn.to_string()))
    }

    fn resolve(&self, class_fqn: &str, version: Option<&str>) -> Result<String> {
        match version {
            Some(v) => Ok(v.to_string()),
            None => self.latest(class_fqn),
        }
    }

    fn write_manifest(
        &self,
        class_fqn: &str,
        version: &str,
        model_type: BaseModelType,
        has_blob: bool,
        stats: &Namespace,
        metrics: &Namespace,
    ) -> Result<()> {
        let mut files = vec![STATS_FILE.to_string(), METRICS_FILE.to_string()];
        if has_blob {
            files.insert(0, MODEL_FILE.to_string());
        }
        self.put_json(&self.key(class_fqn, version, STATS_FILE), stats)?;
        self.put_json(&self.key(class_fqn, version, METRICS_FILE), metrics)?;

        let metainfo = Metainfo {
            class_fqn: class_fqn.to_string(),
            version: version.to_string(),
            model_type,
            created_at: Utc::now().to_rfc3339(),
            files,
        };
        let yaml = serde_yaml::to_string(&metainfo)?;
        self.store
            .put(&self.key(class_fqn, version, METAINFO_FILE), yaml.as_bytes())
    }

    fn read_manifest(&self, class_fqn: &str, version: &str) -> Result<Metainfo> {
        let key = self.key(class_fqn, version, METAINFO_FILE);
        let bytes = self.store.get(&key)?;
        Ok(serde_yaml::from_slice(&bytes)?)
    }

    // -----------------------------------------------------------------------
    // Students
    // -----------------------------------------------------------------------

    /// Persist a student. A `version` of `None` mints a fresh identifier;
    /// passing one re-persists under that exact key.
    pub fn persist_student(&self, student: &mut Student, version: Option<&str>) -> Result<String> {
        let version = version.map(str::to_string).unwrap_or_else(mint_version);
        let model_type = match student.base_model {
            StudentLearner::Logistic(_) => BaseModelType::LogisticStudent,
            StudentLearner::Forest(_) => BaseModelType::ForestStudent,
        };
        self.put_json(
            &self.key(STUDENT_FQN, &version, MODEL_FILE),
            &student.base_model,
        )?;
        self.write_manifest(
            STUDENT_FQN,
            &version,
            model_type,
            true,
            &student.stats,
            &student.metrics,
        )?;
        student.version = Some(version.clone());
        Ok(version)
    }

    pub fn load_student(&self, version: &str) -> Result<Student> {
        let base_model: StudentLearner =
            self.get_json(&self.key(STUDENT_FQN, version, MODEL_FILE))?;
        let stats: Namespace = self.get_json(&self.key(STUDENT_FQN, version, STATS_FILE))?;
        let metrics: Namespace =
            self.get_json(&self.key(STUDENT_FQN, version, METRICS_FILE))?;
        Ok(Student {
            base_model,
            stats,
            metrics,
            version: Some(version.to_string()),
        })
    }

    // -----------------------------------------------------------------------
    // Ensemblers
    // -----------------------------------------------------------------------

    pub fn persist_ensembler(
        &self,
        ensembler: &mut Ensembler,
        version: Option<&str>,
    ) -> Result<String> {
        let version = version.map(str::to_string).unwrap_or_else(mint_version);
        match ensembler {
            Ensembler::MajorityVote(e) => {
                self.put_json(&self.key(ENSEMBLER_FQN, &version, MODEL_FILE), e)?;
                self.write_manifest(
                    ENSEMBLER_FQN,
                    &version,
                    BaseModelType::MajorityVoteEnsembler,
                    true,
                    &Namespace::new(),
                    &Namespace::new(),
                )?;
            }
            Ensembler::Learned(e) => {
                self.put_json(
                    &self.key(ENSEMBLER_FQN, &version, MODEL_FILE),
                    &e.base_model,
                )?;
                self.write_manifest(
                    ENSEMBLER_FQN,
                    &version,
                    BaseModelType::LearnedEnsembler,
                    true,
                    &e.stats,
                    &e.metrics,
                )?;
                e.version = Some(version.clone());
            }
        }
        Ok(version)
    }

    pub fn load_ensembler(&self, version: &str) -> Result<Ensembler> {
        let manifest = self.read_manifest(ENSEMBLER_FQN, version)?;
        match manifest.model_type {
            BaseModelType::MajorityVoteEnsembler => {
                let model: MajorityVoteEnsembler =
                    self.get_json(&self.key(ENSEMBLER_FQN, version, MODEL_FILE))?;
                Ok(Ensembler::MajorityVote(model))
            }
            BaseModelType::LearnedEnsembler => {
                let base_model: MlpClassifier =
                    self.get_json(&self.key(ENSEMBLER_FQN, version, MODEL_FILE))?;
                let stats: Namespace =
                    self.get_json(&self.key(ENSEMBLER_FQN, version, STATS_FILE))?;
                let metrics: Namespace =
                    self.get_json(&self.key(ENSEMBLER_FQN, version, METRICS_FILE))?;
                Ok(Ensembler::Learned(LearnedEnsembler {
                    base_model,
                    stats,
                    metrics,
                    version: Some(version.to_string()),
                }))
            }
            other => Err(OracleError::Serialization(format!(
                "artifact {}::{} is a {:?}, not an ensembler",
                ENSEMBLER_FQN, version, other
            ))),
        }
    }

    // -----------------------------------------------------------------------
    // Teachers
    // -----------------------------------------------------------------------

    /// Persist a teacher on its own, returning `(class_fqn, version)`.
    pub fn persist_teacher(
        &self,
        teacher: &TeacherModel,
        version: Option<&str>,
    ) -> Result<(String, String)> {
        let version = version.map(str::to_string).unwrap_or_else(mint_version);
        match teacher {
            TeacherModel::Fuzzy(t) => {
                self.put_json(
                    &self.key(FUZZY_TEACHER_FQN, &version, MODEL_FILE),
                    &t.controller,
                )?;
                self.write_manifest(
                    FUZZY_TEACHER_FQN,
                    &version,
                    BaseModelType::FuzzyTeacher,
                    true,
                    &Namespace::new(),
                    &Namespace::new(),
                )?;
                Ok((FUZZY_TEACHER_FQN.to_string(), version))
            }
            TeacherModel::Rule(t) => {
                // Predicates are code; only the manifest and label list are
                // stored.
                let mut stats = Namespace::new();
                stats.set("labels", NsValue::str_list(t.labels().iter().cloned()));
                self.write_manifest(
                    t.class_fqn(),
                    &version,
                    BaseModelType::RuleTeacher,
                    false,
                    &stats,
                    &Namespace::new(),
                )?;
                Ok((t.class_fqn().to_string(), version))
            }
        }
    }

    /// Load a teacher by class FQN. Rule teacher classes resolve through
    /// the registry; fuzzy teachers rehydrate from their stored controller.
    pub fn load_teacher(&self, class_fqn: &str, version: &str) -> Result<TeacherModel> {
        if class_fqn == FUZZY_TEACHER_FQN {
            let controller: FuzzyController =
                self.get_json(&self.key(FUZZY_TEACHER_FQN, version, MODEL_FILE))?;
            return Ok(TeacherModel::Fuzzy(FuzzyTeacher { controller }));
        }
        // Fail on a dangling reference before constructing anything.
        let manifest = self.read_manifest(class_fqn, version)?;
        if manifest.model_type != BaseModelType::RuleTeacher {
            return Err(OracleError::Serialization(format!(
                "artifact {}::{} is a {:?}, not a teacher",
                class_fqn, version, manifest.model_type
            )));
        }
        Ok(TeacherModel::Rule(self.registry.construct(class_fqn)?))
    }

    // -----------------------------------------------------------------------
    // Oracles
    // -----------------------------------------------------------------------

    /// Persist an oracle and all of its submodels. Submodel references land
    /// in the oracle's stats under `model_details`; the returned version
    /// identifies the oracle itself. A `version` of `None` mints a fresh
    /// identifier; passing the oracle's previous version re-persists it in
    /// place. Submodels that already carry a version keep it.
    pub fn persist_oracle(&self, oracle: &mut Oracle, version: Option<&str>) -> Result<String> {
        let version = version.map(str::to_string).unwrap_or_else(mint_version);
        oracle.stats.remove("model_details");

        let (teacher_fqn, teacher_version) = self.persist_teacher(&oracle.teacher, None)?;
        oracle
            .stats
            .set("model_details.teacher", model_ref(&teacher_fqn, &teacher_version));

        for (label, students) in oracle.students.iter_mut() {
            let mut refs = Vec::with_capacity(students.len());
            for student in students.iter_mut() {
                let existing = student.version.clone();
                let v = self.persist_student(student, existing.as_deref())?;
                refs.push(model_ref(STUDENT_FQN, &v));
            }
            oracle
                .stats
                .set(&format!("model_details.students.{}", label), NsValue::List(refs));
        }

        for (label, ensembler) in oracle.ensemblers.iter_mut() {
            let existing = match ensembler {
                Ensembler::Learned(e) => e.version.clone(),
                Ensembler::MajorityVote(_) => None,
            };
            let v = self.persist_ensembler(ensembler, existing.as_deref())?;
            oracle.stats.set(
                &format!("model_details.ensemblers.{}", label),
                model_ref(ENSEMBLER_FQN, &v),
            );
        }

        self.write_manifest(
            ORACLE_FQN,
            &version,
            BaseModelType::Oracle,
            false,
            &oracle.stats,
            &oracle.metrics,
        )?;
        log::info!("persisted oracle {}::{}", ORACLE_FQN, version);
        oracle.version = Some(version.clone());
        Ok(version)
    }

    /// Load an oracle; `version` of `None` resolves to the latest persisted
    /// one.
    pub fn load_oracle(&self, version: Option<&str>) -> Result<Oracle> {
        let version = self.resolve(ORACLE_FQN, version)?;
        let stats: Namespace = self.get_json(&self.key(ORACLE_FQN, &version, STATS_FILE))?;
        let metrics: Namespace =
            self.get_json(&self.key(ORACLE_FQN, &version, METRICS_FILE))?;

        let (teacher_fqn, teacher_version) = parse_ref(
            stats.get("model_details.teacher").ok_or_else(|| {
                OracleError::Serialization(
                    "oracle stats missing 'model_details.teacher'".to_string(),
                )
            })?,
        )?;
        let teacher = self.load_teacher(&teacher_fqn, &teacher_version)?;

        let mut students = BTreeMap::new();
        if let Some(by_label) = stats
            .get("model_details.students")
            .and_then(NsValue::as_map)
        {
            for (label, refs) in by_label {
                let refs = refs.as_list().ok_or_else(|| {
                    OracleError::Serialization(format!(
                        "student references for '{}' are not a list",
                        label
                    ))
                })?;
                let mut loaded = Vec::with_capacity(refs.len());
                for r in refs {
                    let (fqn, v) = parse_ref(r)?;
                    if fqn != STUDENT_FQN {
                        return Err(OracleError::Serialization(format!(
                            "unexpected student class '{}'",
                            fqn
                        )));
                    }
                    loaded.push(self.load_student(&v)?);
                }
                students.insert(label.clone(), loaded);
            }
        }

        let mut ensemblers = BTreeMap::new();
        if let Some(by_label) = stats
            .get("model_details.ensemblers")
            .and_then(NsValue::as_map)
        {
            for (label, r) in by_label {
                let (fqn, v) = parse_ref(r)?;
                if fqn != ENSEMBLER_FQN {
                    return Err(OracleError::Serialization(format!(
                        "unexpected ensembler class '{}'",
                        fqn
                    )));
                }
                ensemblers.insert(label.clone(), self.load_ensembler(&v)?);
            }
        }

        Ok(Oracle {
            teacher,
            students,
            ensemblers,
            stats,
            metrics,
            version: Some(version),
        })
    }
}

impl fmt::Debug for ModelStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelStore")
            .field("prefix", &self.prefix)
            .field("registry", &self.registry)
            .finish()
    }
}

fn model_ref(class_fqn: &str, version: &str) -> NsValue {
    let mut map = BTreeMap::new();
    map.insert(
        "class_fqn".to_string(),
        NsValue::Str(class_fqn.to_string()),
    );
    map.insert("version".to_string(), NsValue::Str(version.to_string()));
    NsValue::Map(map)
}

fn parse_ref(value: &NsValue) -> Result<(String, String)> {
    let map = value.as_map().ok_or_else(|| {
        OracleError::Serialization("model reference is not a mapping".to_string())
    })?;
    let field = |name: &str| -> Result<String> {
        map.get(name)
            .and_then(NsValue::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                OracleError::Serialization(format!("model reference missing '{}'", name))
            })
    };
    Ok((field("class_fqn")?, field("version")?))
}
