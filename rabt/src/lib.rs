//! # Rabt: a runtime dependency injection container
//!
//! Register [`Binding`]s for names, symbols and types, then resolve them
//! from a [`Container`]. Containers nest, cache values per lifetime and
//! dispose what they built.
//!
//! ```
//! use rabt::prelude::*;
//!
//! let container = Container::new([
//!     bind(["greeting"]).unwrap().to_value(Value::new("hello".to_string())),
//! ]);
//! assert_eq!(*container.get::<String>("greeting").unwrap(), "hello");
//! ```

pub use rabt_container::*;
pub use rabt_support::*;
