//! Configuration resolver: [`LaunchSpec`] to [`ResolvedLaunch`].

use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::error::{LaunchError, LaunchResult};
use crate::launch::{Directive, DirectiveValue, GpuRequest, LaunchMode, LaunchSpec, ResolvedLaunch};
use crate::site::SiteDefaults;

/// Resolve a partially specified launch against the site table.
///
/// Unset resources stay unset. Precedence when both are given:
/// `job_array_name` over `job_name`, `gres` over `gpus`.
pub fn resolve(spec: &LaunchSpec, site: &SiteDefaults) -> LaunchResult<ResolvedLaunch> {
    let mode = resolve_mode(spec)?;
    let names = &site.names;

    let partition = match spec.partition.as_deref().map(str::trim) {
        Some("") => return Err(LaunchError::config("partition must not be blank")),
        Some(partition) => partition.to_string(),
        None => site.default_partition.clone(),
    };

    let mut directives = Vec::new();
    let mut push = |name: &str, value: Option<String>| {
        if let Some(value) = value {
            directives.push(Directive::value(name, value));
        }
    };

    push(&names.nodes, spec.nodes.map(|v| v.to_string()));
    push(&names.ntasks, spec.ntasks.map(|v| v.to_string()));
    push(
        &names.ntasks_per_node,
        spec.ntasks_per_node.map(|v| v.to_string()),
    );
    push(
        &names.cpus_per_task,
        spec.cpus_per_task.map(|v| v.to_string()),
    );
    push(&names.mem, spec.mem.clone());
    push(&names.time, spec.time.clone());
    push(
        &names.gres,
        resolve_gpus(spec)?.map(|request| request.gres_value()),
    );
    push(&names.account, spec.account.clone());
    push(&names.qos, spec.qos.clone());
    push(&names.begin, spec.begin.clone());
    push(&names.mail_type, spec.mail_type.clone());
    push(&names.mail_user, spec.mail_user.clone());

    let mut seen: FxHashSet<String> = directives.iter().map(|d| d.name.clone()).collect();
    seen.insert(names.partition.clone());
    let reserved = names.reserved();

    for extra in spec.additional.iter() {
        let name = extra.name.trim().replace('_', "-");
        if name.is_empty() {
            return Err(LaunchError::config("additional directive with an empty name"));
        }
        if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(LaunchError::config(format!(
                "additional directive name {name:?} contains whitespace"
            )));
        }
        if reserved.contains(&name.as_str()) {
            return Err(LaunchError::config(format!(
                "additional directive '{name}' is managed by the launcher and cannot be set in {} mode",
                if mode.is_array() { "array" } else { "individual" }
            )));
        }
        if !seen.insert(name.clone()) {
            return Err(LaunchError::config(format!(
                "directive '{name}' is given more than once"
            )));
        }
        directives.push(Directive::new(name, extra.value.clone()));
    }

    check_single_line("partition", &partition)?;
    for directive in &directives {
        if let DirectiveValue::Value(value) = &directive.value {
            check_single_line(&directive.name, value)?;
        }
    }
    for line in &spec.setup {
        check_single_line("setup line", line)?;
    }

    debug!(
        ?mode,
        partition = %partition,
        directives = directives.len(),
        "Resolved launch options"
    );

    Ok(ResolvedLaunch {
        mode,
        partition,
        directives,
        setup: spec.setup.clone(),
    })
}

/// A line break would end the directive and start a new one.
fn check_single_line(what: &str, value: &str) -> LaunchResult<()> {
    if value.contains(['\n', '\r']) {
        return Err(LaunchError::config(format!(
            "{what} must be a single line, got {value:?}"
        )));
    }
    Ok(())
}

fn resolve_mode(spec: &LaunchSpec) -> LaunchResult<LaunchMode> {
    let job_name = match spec.job_name.as_deref() {
        Some(name) if name.trim().is_empty() => {
            return Err(LaunchError::config("job_name must not be blank"));
        }
        other => other.map(str::to_string),
    };
    if let Some(name) = &job_name {
        check_single_line("job_name", name)?;
    }
    if let Some(name) = &spec.job_array_name {
        check_single_line("job_array_name", name)?;
    }

    match spec.job_array_name.as_deref() {
        Some(name) if name.trim().is_empty() => {
            Err(LaunchError::config("job_array_name must not be blank"))
        }
        Some(name) => {
            if let Some(job_name) = job_name {
                warn!(
                    job_name = %job_name,
                    job_array_name = %name,
                    "Both job_name and job_array_name are set, submitting as an array and ignoring job_name"
                );
            }
            Ok(LaunchMode::Array {
                name: name.to_string(),
            })
        }
        None => Ok(LaunchMode::Individual { job_name }),
    }
}

fn resolve_gpus(spec: &LaunchSpec) -> LaunchResult<Option<GpuRequest>> {
    if spec.gpus == Some(0) {
        return Err(LaunchError::config("gpus must be at least 1 when given"));
    }

    Ok(match (&spec.gres, spec.gpus) {
        (Some(gres), Some(gpus)) => {
            warn!(gres = %gres, gpus, "Both gres and gpus are set, using gres");
            Some(GpuRequest::Gres(gres.clone()))
        }
        (Some(gres), None) => Some(GpuRequest::Gres(gres.clone())),
        (None, Some(gpus)) => Some(GpuRequest::Gpus(gpus)),
        (None, None) => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(resolved: &ResolvedLaunch) -> Vec<&str> {
        resolved.directives.iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    fn test_unset_fields_omitted() {
        let resolved = resolve(&LaunchSpec::new(), &SiteDefaults::default()).unwrap();
        assert_eq!(resolved.partition, "default");
        assert!(resolved.directives.is_empty());
        assert_eq!(resolved.mode, LaunchMode::Individual { job_name: None });
    }

    #[test]
    fn test_field_order_is_fixed() {
        let spec = LaunchSpec::new()
            .with_account("proj")
            .with_mem("16G")
            .with_cpus_per_task(4)
            .with_time("01:00:00");
        let resolved = resolve(&spec, &SiteDefaults::default()).unwrap();
        assert_eq!(names(&resolved), vec!["cpus-per-task", "mem", "time", "account"]);
    }

    #[test]
    fn test_gres_wins_over_gpus() {
        let spec = LaunchSpec::new().with_gres("gpu:a100:1").with_gpus(4);
        let resolved = resolve(&spec, &SiteDefaults::default()).unwrap();
        assert_eq!(
            resolved.directives,
            vec![Directive::value("gres", "gpu:a100:1")]
        );
    }

    #[test]
    fn test_gpus_become_gres() {
        let spec = LaunchSpec::new().with_gpus(2);
        let resolved = resolve(&spec, &SiteDefaults::default()).unwrap();
        assert_eq!(resolved.directives, vec![Directive::value("gres", "gpu:2")]);
    }

    #[test]
    fn test_zero_gpus_rejected() {
        let spec = LaunchSpec::new().with_gpus(0);
        assert!(matches!(
            resolve(&spec, &SiteDefaults::default()),
            Err(LaunchError::Configuration(_))
        ));
    }

    #[test]
    fn test_array_name_wins() {
        let spec = LaunchSpec::new()
            .with_job_name("single")
            .with_job_array_name("sweep1");
        let resolved = resolve(&spec, &SiteDefaults::default()).unwrap();
        assert_eq!(
            resolved.mode,
            LaunchMode::Array {
                name: "sweep1".to_string()
            }
        );
    }

    #[test]
    fn test_blank_names_rejected() {
        let site = SiteDefaults::default();
        assert!(resolve(&LaunchSpec::new().with_job_array_name("  "), &site).is_err());
        assert!(resolve(&LaunchSpec::new().with_job_name(""), &site).is_err());
        assert!(resolve(&LaunchSpec::new().with_partition(""), &site).is_err());
    }

    #[test]
    fn test_additional_normalized_and_appended() {
        let spec = LaunchSpec::new()
            .with_mem("4G")
            .with_additional("exclusive", DirectiveValue::Flag)
            .with_additional("mem_per_gpu", DirectiveValue::value("8G"));
        let resolved = resolve(&spec, &SiteDefaults::default()).unwrap();
        assert_eq!(names(&resolved), vec!["mem", "exclusive", "mem-per-gpu"]);
    }

    #[test]
    fn test_reserved_additional_rejected() {
        let site = SiteDefaults::default();
        for key in ["array", "output", "error", "job_name"] {
            let spec = LaunchSpec::new()
                .with_job_array_name("sweep")
                .with_additional(key, DirectiveValue::value("x"));
            let err = resolve(&spec, &site).unwrap_err();
            assert!(err.to_string().contains("array mode"), "{err}");
        }
    }

    #[test]
    fn test_reserved_additional_rejected_for_individual_jobs() {
        let site = SiteDefaults::default();
        for key in ["array", "output", "error", "job-name"] {
            let spec = LaunchSpec::new()
                .with_job_name("train")
                .with_additional(key, DirectiveValue::value("x"));
            let err = resolve(&spec, &site).unwrap_err();
            assert!(err.to_string().contains("individual mode"), "{err}");
        }

        let spec = LaunchSpec::new().with_additional("output", DirectiveValue::Flag);
        assert!(matches!(
            resolve(&spec, &site),
            Err(LaunchError::Configuration(_))
        ));
    }

    #[test]
    fn test_line_breaks_in_values_rejected() {
        let site = SiteDefaults::default();
        let injected = "4G\n#SBATCH --exclusive";
        let specs = [
            LaunchSpec::new().with_mem(injected),
            LaunchSpec::new().with_time("1:00:00\r\n#SBATCH --qos=high"),
            LaunchSpec::new().with_account(injected),
            LaunchSpec::new().with_gres(injected),
            LaunchSpec::new().with_partition(injected),
            LaunchSpec::new().with_job_name(injected),
            LaunchSpec::new().with_job_array_name(injected),
            LaunchSpec::new().with_additional("constraint", DirectiveValue::value(injected)),
        ];
        for spec in specs {
            let err = resolve(&spec, &site).unwrap_err();
            assert!(err.to_string().contains("single line"), "{err}");
        }
    }

    #[test]
    fn test_whitespace_in_additional_name_rejected() {
        let site = SiteDefaults::default();
        for name in ["mem per cpu", "exclusive\n#SBATCH --qos=high", "a\tb"] {
            let spec = LaunchSpec::new().with_additional(name, DirectiveValue::Flag);
            assert!(matches!(
                resolve(&spec, &site),
                Err(LaunchError::Configuration(_))
            ));
        }

        // Surrounding whitespace is trimmed.
        let spec = LaunchSpec::new().with_additional(" exclusive ", DirectiveValue::Flag);
        let resolved = resolve(&spec, &site).unwrap();
        assert_eq!(names(&resolved), vec!["exclusive"]);
    }

    #[test]
    fn test_duplicate_additional_rejected() {
        let site = SiteDefaults::default();
        let spec = LaunchSpec::new()
            .with_mem("4G")
            .with_additional("mem", DirectiveValue::value("8G"));
        assert!(resolve(&spec, &site).is_err());

        let spec = LaunchSpec::new().with_additional("partition", DirectiveValue::value("gpu"));
        assert!(resolve(&spec, &site).is_err());

        let spec = LaunchSpec::new()
            .with_additional("constraint", DirectiveValue::value("a"))
            .with_additional("constraint", DirectiveValue::value("b"));
        assert!(resolve(&spec, &site).is_err());
    }

    #[test]
    fn test_multiline_setup_rejected() {
        let spec = LaunchSpec::new().with_setup("module load x\n#SBATCH --mem=1T");
        assert!(resolve(&spec, &SiteDefaults::default()).is_err());
    }

    #[test]
    fn test_site_table_renames_directives() {
        let mut site = SiteDefaults::default().with_default_partition("batch");
        site.names.mem = "memory".to_string();
        let resolved = resolve(&LaunchSpec::new().with_mem("1G"), &site).unwrap();
        assert_eq!(resolved.partition, "batch");
        assert_eq!(names(&resolved), vec!["memory"]);
    }
}
