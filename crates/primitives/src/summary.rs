/// A trait for objects that can be summarized into a string for logging purposes.
///
/// Sometimes the Debug impl is too verbose, and the Display impl does something different
/// than what we want. This trait allows us to have our custom verbosity.
pub trait Summary {
    /// Returns a summary of the object.
    fn summary(&self) -> String;
}

impl<T: Summary> Summary for [T] {
    fn summary(&self) -> String {
        match (self.first(), self.last()) {
            (Some(first), Some(last)) if self.len() > 1 => {
                format!("count={}, first=[{}], last=[{}]", self.len(), first.summary(), last.summary())
            }
            (Some(only), _) => format!("count=1, [{}]", only.summary()),
            _ => "count=0".to_owned(),
        }
    }
}
