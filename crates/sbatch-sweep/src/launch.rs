//! Launch option types.
//!
//! [`LaunchSpec`] is what users write: every field is optional and nothing is
//! checked. [`ResolvedLaunch`] is what the renderer consumes, produced by
//! [`crate::resolve::resolve`].

use std::fmt;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;

/// Partially specified submission options for one sweep.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LaunchSpec {
    /// Target queue.
    pub partition: Option<String>,

    /// Job name for individual submissions.
    pub job_name: Option<String>,

    /// Job array name. When set, all tasks go out as one array.
    pub job_array_name: Option<String>,

    pub nodes: Option<u32>,
    pub ntasks: Option<u32>,
    pub ntasks_per_node: Option<u32>,
    pub cpus_per_task: Option<u32>,
    pub mem: Option<String>,
    pub time: Option<String>,

    /// Generic resource string, e.g. `gpu:a100:2`.
    pub gres: Option<String>,

    /// Plain GPU count, rendered as `gres=gpu:<n>`.
    pub gpus: Option<u32>,

    pub account: Option<String>,
    pub qos: Option<String>,
    pub begin: Option<String>,

    pub mail_type: Option<String>,
    pub mail_user: Option<String>,

    /// Extra directives, rendered verbatim in the order given.
    pub additional: AdditionalDirectives,

    /// Shell lines executed before the application.
    pub setup: Vec<String>,
}

impl LaunchSpec {
    /// Create an empty spec.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = Some(partition.into());
        self
    }

    pub fn with_job_name(mut self, name: impl Into<String>) -> Self {
        self.job_name = Some(name.into());
        self
    }

    pub fn with_job_array_name(mut self, name: impl Into<String>) -> Self {
        self.job_array_name = Some(name.into());
        self
    }

    pub fn with_cpus_per_task(mut self, cpus: u32) -> Self {
        self.cpus_per_task = Some(cpus);
        self
    }

    pub fn with_mem(mut self, mem: impl Into<String>) -> Self {
        self.mem = Some(mem.into());
        self
    }

    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.time = Some(time.into());
        self
    }

    pub fn with_gres(mut self, gres: impl Into<String>) -> Self {
        self.gres = Some(gres.into());
        self
    }

    pub fn with_gpus(mut self, gpus: u32) -> Self {
        self.gpus = Some(gpus);
        self
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    /// Append an extra directive.
    pub fn with_additional(mut self, name: impl Into<String>, value: DirectiveValue) -> Self {
        self.additional.0.push(Directive::new(name, value));
        self
    }

    /// Append a setup line.
    pub fn with_setup(mut self, line: impl Into<String>) -> Self {
        self.setup.push(line.into());
        self
    }
}

/// Value part of a scheduler directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveValue {
    /// Bare flag, e.g. `--exclusive`.
    Flag,
    /// `--name=value`.
    Value(String),
}

impl DirectiveValue {
    pub fn value(value: impl Into<String>) -> Self {
        DirectiveValue::Value(value.into())
    }
}

/// A single scheduler directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub name: String,
    pub value: DirectiveValue,
}

impl Directive {
    pub fn new(name: impl Into<String>, value: DirectiveValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, DirectiveValue::Value(value.into()))
    }
}

/// Ordered list of user-supplied directives.
///
/// Deserializes from a YAML/JSON mapping while keeping the mapping's order.
/// `true` becomes a flag, `false` and `null` drop the entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdditionalDirectives(pub Vec<Directive>);

impl AdditionalDirectives {
    pub fn iter(&self) -> impl Iterator<Item = &Directive> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Keeps the decimal point of integral floats, so `1.0` stays `1.0`.
fn format_float(value: f64) -> String {
    format!("{value:?}")
}

impl<'de> Deserialize<'de> for AdditionalDirectives {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = AdditionalDirectives;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of directive names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut directives = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((name, raw)) = map.next_entry::<String, Option<RawValue>>()? {
                    let value = match raw {
                        None | Some(RawValue::Bool(false)) => continue,
                        Some(RawValue::Bool(true)) => DirectiveValue::Flag,
                        Some(RawValue::Int(v)) => DirectiveValue::Value(v.to_string()),
                        Some(RawValue::Float(v)) => DirectiveValue::Value(format_float(v)),
                        Some(RawValue::Str(v)) => DirectiveValue::Value(v),
                    };
                    directives.push(Directive::new(name, value));
                }
                Ok(AdditionalDirectives(directives))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(AdditionalDirectives::default())
            }
        }

        deserializer.deserialize_any(OrderedVisitor)
    }
}

/// Submission mode for a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchMode {
    /// One `sbatch` call per task. `job_name` overrides the per-task name in
    /// directives and log files.
    Individual { job_name: Option<String> },
    /// One `sbatch` call for the whole sweep.
    Array { name: String },
}

impl LaunchMode {
    pub fn is_array(&self) -> bool {
        matches!(self, LaunchMode::Array { .. })
    }
}

/// How GPUs were requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpuRequest {
    Gres(String),
    Gpus(u32),
}

impl GpuRequest {
    /// Value of the `gres` directive for this request.
    pub fn gres_value(&self) -> String {
        match self {
            GpuRequest::Gres(gres) => gres.clone(),
            GpuRequest::Gpus(count) => format!("gpu:{count}"),
        }
    }
}

/// Fully resolved launch options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLaunch {
    pub mode: LaunchMode,
    pub partition: String,
    /// Resource, policy and extra directives in render order.
    pub directives: Vec<Directive>,
    pub setup: Vec<String>,
}
