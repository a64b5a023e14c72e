//! Deterministic object keys.
//!
//! Keys depend only on the job id (and seed for the queue layout), so a
//! retried publish of the same job overwrites the same object.

use lipsync_models::{output_file_name, JobId, JobOrigin};

/// How result keys are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKeyLayout {
    /// `{job_id}.mp4`
    Flat,
    /// `{job_id}/output_{seed}.mp4`
    PerJobDirectory,
}

impl ObjectKeyLayout {
    pub fn for_origin(origin: JobOrigin) -> Self {
        match origin {
            JobOrigin::Http => ObjectKeyLayout::Flat,
            JobOrigin::Queue => ObjectKeyLayout::PerJobDirectory,
        }
    }

    pub fn key(&self, job_id: &JobId, seed: i64) -> String {
        match self {
            ObjectKeyLayout::Flat => format!("{}.mp4", job_id),
            ObjectKeyLayout::PerJobDirectory => format!("{}/{}", job_id, output_file_name(seed)),
        }
    }
}

/// Result key for a job admitted through `origin`.
pub fn result_key(origin: JobOrigin, job_id: &JobId, seed: i64) -> String {
    ObjectKeyLayout::for_origin(origin).key(job_id, seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::validate_key;

    #[test]
    fn test_keys_are_deterministic() {
        let id = JobId::parse("job-1").unwrap();
        assert_eq!(result_key(JobOrigin::Http, &id, 7), "job-1.mp4");
        assert_eq!(result_key(JobOrigin::Http, &id, 7), result_key(JobOrigin::Http, &id, 99));
        assert_eq!(result_key(JobOrigin::Queue, &id, 42), "job-1/output_42.mp4");
    }

    #[test]
    fn test_keys_differ_across_jobs() {
        let a = JobId::new();
        let b = JobId::new();
        assert_ne!(result_key(JobOrigin::Queue, &a, 1), result_key(JobOrigin::Queue, &b, 1));
    }

    #[test]
    fn test_keys_are_valid() {
        let id = JobId::new();
        assert!(validate_key(&result_key(JobOrigin::Queue, &id, -3)).is_ok());
    }
}
