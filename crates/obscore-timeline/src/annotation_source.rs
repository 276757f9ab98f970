use obscore_types::Annotation;

/// Pluggable source of annotations for a session. Annotation production is
/// out of scope for this core; implementors adapt whatever external
/// scoring/labeling subsystem a deployment uses.
pub trait AnnotationSource: Send + Sync {
    fn load(&self, session_id: &str) -> crate::error::Result<Vec<Annotation>>;
}

/// An `AnnotationSource` that never has any annotations. Useful as a
/// default when a deployment has no annotation subsystem wired up.
pub struct NoAnnotations;

impl AnnotationSource for NoAnnotations {
    fn load(&self, _session_id: &str) -> crate::error::Result<Vec<Annotation>> {
        Ok(Vec::new())
    }
}
