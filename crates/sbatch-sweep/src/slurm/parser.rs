//! Parsers for sbatch output.

use crate::error::{LaunchError, LaunchResult};

/// Parse sbatch output to extract the job ID.
///
/// Accepts the default `Submitted batch job 12345` line anywhere in the
/// output, and the `--parsable` forms `12345` and `12345;cluster`.
pub fn parse_sbatch_output(output: &str) -> LaunchResult<String> {
    for line in output.lines().map(str::trim) {
        let candidate = match line.strip_prefix("Submitted batch job ") {
            Some(rest) => rest.split_whitespace().next().unwrap_or(""),
            None => line.split(';').next().unwrap_or(""),
        };
        if is_job_id(candidate) {
            return Ok(candidate.to_string());
        }
    }

    Err(LaunchError::Submission {
        stderr: format!(
            "sbatch exited successfully but printed no job id: {}",
            output.trim()
        ),
    })
}

fn is_job_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sbatch_output() {
        let output = "Submitted batch job 12345\n";
        assert_eq!(parse_sbatch_output(output).unwrap(), "12345");

        let output = "Submitted batch job 9999999";
        assert_eq!(parse_sbatch_output(output).unwrap(), "9999999");
    }

    #[test]
    fn test_parse_sbatch_output_with_banner() {
        let output = "sbatch: Account defaulted to proj\nSubmitted batch job 42\n";
        assert_eq!(parse_sbatch_output(output).unwrap(), "42");
    }

    #[test]
    fn test_parse_sbatch_parsable() {
        assert_eq!(parse_sbatch_output("777\n").unwrap(), "777");
        assert_eq!(parse_sbatch_output("777;cluster1\n").unwrap(), "777");
    }

    #[test]
    fn test_parse_sbatch_output_error() {
        let output = "Error: some error message";
        assert!(matches!(
            parse_sbatch_output(output),
            Err(LaunchError::Submission { .. })
        ));
        assert!(parse_sbatch_output("").is_err());
        assert!(parse_sbatch_output("Submitted batch job abc").is_err());
    }
}
