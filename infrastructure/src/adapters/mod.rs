//! Concrete `ModelAdapter` implementations. Real provider wire formats are
//! explicitly out of scope; `echo` is the reference/test adapter.

pub mod echo;

pub use echo::EchoAdapter;
