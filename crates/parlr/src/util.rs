use std::fmt;

/// Wrap a closure as a `fmt::Display` value.
pub fn display_fn<F>(f: F) -> impl fmt::Display
where
    F: Fn(&mut fmt::Formatter<'_>) -> fmt::Result,
{
    struct DisplayFn<F>(F);
    impl<F> fmt::Display for DisplayFn<F>
    where
        F: Fn(&mut fmt::Formatter<'_>) -> fmt::Result,
    {
        fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            (self.0)(formatter)
        }
    }
    DisplayFn(f)
}
