//! Parameter tables of the PCATS analysis methods.
//!
//! Every option the service recognises is an explicit field here, carrying the
//! service's default. Each structure renders itself into a [`MultipartForm`]
//! using the service's dotted wire names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::form::MultipartForm;
use crate::{HEADER_REUSE_CACHED_JOBID, HEADER_USE_CACHE};

/// Where a data field's content comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    /// Local file, uploaded as part of the request
    #[serde(rename = "file")]
    File(PathBuf),
    /// Reference returned by an earlier upload
    #[serde(rename = "fileref")]
    FileRef(String),
}

impl DataSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        DataSource::File(path.into())
    }

    pub fn fileref(fileref: impl Into<String>) -> Self {
        DataSource::FileRef(fileref.into())
    }
}

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum!(
    /// Model family fitted by the service
    Method {
        #[default]
        Bart => "BART",
        Gp => "GP",
    }
);

wire_enum!(
    /// Type of the outcome variable
    OutcomeType {
        #[default]
        Continuous => "Continuous",
        Discrete => "Discrete",
    }
);

wire_enum!(
    /// Type of a treatment variable
    TreatmentType {
        #[default]
        Discrete => "Discrete",
        Continuous => "Continuous",
    }
);

wire_enum!(
    /// Whether the outcome is bounded, censored, or neither
    BoundCensor {
        #[default]
        Neither => "neither",
        Bounded => "bounded",
        Censored => "censored",
    }
);

wire_enum!(
    /// Link function applied to the outcome
    OutcomeLink {
        #[default]
        Identity => "identity",
        Log => "log",
        Logit => "logit",
    }
);

/// Header-level options shared by every submission.
///
/// Unset values fall back to the client's configured defaults.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestOptions {
    /// Bearer token for authenticated deployments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Whether the service may answer from its result cache
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_cache: Option<bool>,
    /// Whether the service may return a cached job id instead of recomputing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reuse_cached_jobid: Option<bool>,
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("use_cache", &self.use_cache)
            .field("reuse_cached_jobid", &self.reuse_cached_jobid)
            .finish()
    }
}

impl RequestOptions {
    /// Fill unset values from `defaults`.
    pub fn or(&self, defaults: &RequestOptions) -> RequestOptions {
        RequestOptions {
            token: self.token.clone().or_else(|| defaults.token.clone()),
            use_cache: self.use_cache.or(defaults.use_cache),
            reuse_cached_jobid: self.reuse_cached_jobid.or(defaults.reuse_cached_jobid),
        }
    }

    /// Request headers these options translate to.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::new();
        if let Some(ref token) = self.token {
            headers.push(("Authorization", format!("Bearer {}", token)));
        }
        if let Some(use_cache) = self.use_cache {
            headers.push((HEADER_USE_CACHE, flag(use_cache)));
        }
        if let Some(reuse) = self.reuse_cached_jobid {
            headers.push((HEADER_REUSE_CACHED_JOBID, flag(reuse)));
        }
        headers
    }
}

fn flag(value: bool) -> String {
    let flag = if value { "1" } else { "0" };
    flag.to_string()
}

fn default_iterations() -> u32 {
    500
}

/// Parameters of a single-stage (static) analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticParams {
    /// Analysis dataset
    pub data: DataSource,
    /// Outcome variable name
    pub outcome: String,
    /// Treatment variable name
    pub treatment: String,
    /// Explanatory covariates, comma separated
    #[serde(default)]
    pub x_explanatory: Option<String>,
    /// Confounding covariates, comma separated
    #[serde(default)]
    pub x_confounding: Option<String>,
    /// Covariates for treatment effect heterogeneity
    #[serde(default)]
    pub tr_hte: Option<String>,
    /// Values of the second treatment
    #[serde(default)]
    pub tr2_values: Option<String>,
    /// Burn-in MCMC iterations
    #[serde(default = "default_iterations")]
    pub burn_num: u32,
    /// Retained MCMC iterations
    #[serde(default = "default_iterations")]
    pub mcmc_num: u32,
    #[serde(default)]
    pub outcome_type: OutcomeType,
    /// Lower bound of a bounded outcome
    #[serde(default)]
    pub outcome_lb: Option<f64>,
    /// Upper bound of a bounded outcome
    #[serde(default)]
    pub outcome_ub: Option<f64>,
    #[serde(default)]
    pub outcome_bound_censor: BoundCensor,
    /// Censoring indicator variable
    #[serde(default)]
    pub outcome_censor_yn: Option<String>,
    /// Lower censoring value variable
    #[serde(default)]
    pub outcome_censor_lv: Option<String>,
    /// Upper censoring value variable
    #[serde(default)]
    pub outcome_censor_uv: Option<String>,
    #[serde(default)]
    pub outcome_link: OutcomeLink,
    #[serde(default)]
    pub tr_type: TreatmentType,
    #[serde(default)]
    pub tr2_type: TreatmentType,
    /// Propensity score values
    #[serde(default)]
    pub pr_values: Option<String>,
    #[serde(default)]
    pub method: Method,
    /// Categorical covariates, comma separated
    #[serde(default)]
    pub x_categorical: Option<String>,
    /// Random seed for the sampler
    #[serde(default)]
    pub seed: Option<u64>,
    /// Multiply imputed dataset
    #[serde(default)]
    pub mi_data: Option<DataSource>,
    #[serde(default)]
    pub options: RequestOptions,
}

impl StaticParams {
    /// Parameters with every optional field at its default.
    pub fn new(data: DataSource, outcome: impl Into<String>, treatment: impl Into<String>) -> Self {
        Self {
            data,
            outcome: outcome.into(),
            treatment: treatment.into(),
            x_explanatory: None,
            x_confounding: None,
            tr_hte: None,
            tr2_values: None,
            burn_num: default_iterations(),
            mcmc_num: default_iterations(),
            outcome_type: OutcomeType::default(),
            outcome_lb: None,
            outcome_ub: None,
            outcome_bound_censor: BoundCensor::default(),
            outcome_censor_yn: None,
            outcome_censor_lv: None,
            outcome_censor_uv: None,
            outcome_link: OutcomeLink::default(),
            tr_type: TreatmentType::default(),
            tr2_type: TreatmentType::default(),
            pr_values: None,
            method: Method::default(),
            x_categorical: None,
            seed: None,
            mi_data: None,
            options: RequestOptions::default(),
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_mi_data(mut self, mi_data: DataSource) -> Self {
        self.mi_data = Some(mi_data);
        self
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn to_form(&self) -> MultipartForm {
        MultipartForm::new()
            .data("data", &self.data)
            .text("outcome", &self.outcome)
            .text("treatment", &self.treatment)
            .opt_text("x.explanatory", self.x_explanatory.as_ref())
            .opt_text("x.confounding", self.x_confounding.as_ref())
            .opt_text("tr.hte", self.tr_hte.as_ref())
            .opt_text("tr2.values", self.tr2_values.as_ref())
            .text("burn.num", self.burn_num)
            .text("mcmc.num", self.mcmc_num)
            .opt_text("outcome.lb", self.outcome_lb)
            .opt_text("outcome.ub", self.outcome_ub)
            .text("outcome.bound_censor", self.outcome_bound_censor)
            .opt_text("outcome.censor.yn", self.outcome_censor_yn.as_ref())
            .opt_text("outcome.censor.lv", self.outcome_censor_lv.as_ref())
            .opt_text("outcome.censor.uv", self.outcome_censor_uv.as_ref())
            .text("outcome.type", self.outcome_type)
            .text("outcome.link", self.outcome_link)
            .opt_text("pr.values", self.pr_values.as_ref())
            .text("tr.type", self.tr_type)
            .text("tr2.type", self.tr2_type)
            .text("method", self.method)
            .opt_text("x.categorical", self.x_categorical.as_ref())
            .opt_text("seed", self.seed)
            .opt_data("mi.data", self.mi_data.as_ref())
    }
}

/// Per-stage parameters of a two-stage analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageParams {
    pub outcome: String,
    pub treatment: String,
    #[serde(default)]
    pub x_explanatory: Option<String>,
    #[serde(default)]
    pub x_confounding: Option<String>,
    #[serde(default)]
    pub tr_hte: Option<String>,
    /// Values of this stage's treatment
    #[serde(default)]
    pub tr_values: Option<String>,
    #[serde(default)]
    pub outcome_type: OutcomeType,
    #[serde(default)]
    pub tr_type: TreatmentType,
    #[serde(default)]
    pub outcome_lb: Option<f64>,
    #[serde(default)]
    pub outcome_ub: Option<f64>,
    #[serde(default)]
    pub outcome_bound_censor: BoundCensor,
    #[serde(default)]
    pub outcome_censor_yn: Option<String>,
    #[serde(default)]
    pub outcome_censor_lv: Option<String>,
    #[serde(default)]
    pub outcome_censor_uv: Option<String>,
    #[serde(default)]
    pub outcome_link: OutcomeLink,
    #[serde(default)]
    pub pr_values: Option<String>,
}

impl StageParams {
    pub fn new(outcome: impl Into<String>, treatment: impl Into<String>) -> Self {
        Self {
            outcome: outcome.into(),
            treatment: treatment.into(),
            x_explanatory: None,
            x_confounding: None,
            tr_hte: None,
            tr_values: None,
            outcome_type: OutcomeType::default(),
            tr_type: TreatmentType::default(),
            outcome_lb: None,
            outcome_ub: None,
            outcome_bound_censor: BoundCensor::default(),
            outcome_censor_yn: None,
            outcome_censor_lv: None,
            outcome_censor_uv: None,
            outcome_link: OutcomeLink::default(),
            pr_values: None,
        }
    }

    /// Append this stage's fields under `prefix` (e.g. "stg1").
    fn append_to(&self, form: MultipartForm, prefix: &str) -> MultipartForm {
        let key = |name: &str| format!("{}.{}", prefix, name);
        form.text(key("outcome"), &self.outcome)
            .text(key("treatment"), &self.treatment)
            .opt_text(key("x.explanatory"), self.x_explanatory.as_ref())
            .opt_text(key("x.confounding"), self.x_confounding.as_ref())
            .opt_text(key("tr.hte"), self.tr_hte.as_ref())
            .opt_text(key("tr.values"), self.tr_values.as_ref())
            .opt_text(key("outcome.lb"), self.outcome_lb)
            .opt_text(key("outcome.ub"), self.outcome_ub)
            .text(key("outcome.bound_censor"), self.outcome_bound_censor)
            .opt_text(key("outcome.censor.lv"), self.outcome_censor_lv.as_ref())
            .opt_text(key("outcome.censor.uv"), self.outcome_censor_uv.as_ref())
            .text(key("outcome.link"), self.outcome_link)
            .opt_text(key("outcome.censor.yn"), self.outcome_censor_yn.as_ref())
            .text(key("outcome.type"), self.outcome_type)
            .text(key("tr.type"), self.tr_type)
            .opt_text(key("pr.values"), self.pr_values.as_ref())
    }
}

/// Parameters of a two-stage (dynamic) analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DynamicParams {
    pub data: DataSource,
    /// First treatment decision point
    pub stage1: StageParams,
    /// Second treatment decision point
    pub stage2: StageParams,
    #[serde(default = "default_iterations")]
    pub burn_num: u32,
    #[serde(default = "default_iterations")]
    pub mcmc_num: u32,
    #[serde(default)]
    pub method: Method,
    #[serde(default)]
    pub x_categorical: Option<String>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub mi_data: Option<DataSource>,
    #[serde(default)]
    pub options: RequestOptions,
}

impl DynamicParams {
    pub fn new(data: DataSource, stage1: StageParams, stage2: StageParams) -> Self {
        Self {
            data,
            stage1,
            stage2,
            burn_num: default_iterations(),
            mcmc_num: default_iterations(),
            method: Method::default(),
            x_categorical: None,
            seed: None,
            mi_data: None,
            options: RequestOptions::default(),
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn to_form(&self) -> MultipartForm {
        let form = MultipartForm::new().data("data", &self.data);
        let form = self.stage1.append_to(form, "stg1");
        let form = self.stage2.append_to(form, "stg2");
        form.text("burn.num", self.burn_num)
            .text("mcmc.num", self.mcmc_num)
            .opt_text("x.categorical", self.x_categorical.as_ref())
            .text("method", self.method)
            .opt_text("seed", self.seed)
            .opt_data("mi.data", self.mi_data.as_ref())
    }
}

/// Parameters of a conditional average treatment effect job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CateParams {
    /// Covariate the effect is conditioned on
    pub x: String,
    /// Control treatment value
    pub control_tr: String,
    /// Active treatment value
    pub treat_tr: String,
    #[serde(default)]
    pub pr_values: Option<String>,
    #[serde(default)]
    pub options: RequestOptions,
}

impl CateParams {
    pub fn new(
        x: impl Into<String>,
        control_tr: impl Into<String>,
        treat_tr: impl Into<String>,
    ) -> Self {
        Self {
            x: x.into(),
            control_tr: control_tr.into(),
            treat_tr: treat_tr.into(),
            pr_values: None,
            options: RequestOptions::default(),
        }
    }

    pub fn with_pr_values(mut self, pr_values: impl Into<String>) -> Self {
        self.pr_values = Some(pr_values.into());
        self
    }

    pub fn to_form(&self) -> MultipartForm {
        MultipartForm::new()
            .text("x", &self.x)
            .text("control.tr", &self.control_tr)
            .text("treat.tr", &self.treat_tr)
            .opt_text("pr.values", self.pr_values.as_ref())
    }
}
