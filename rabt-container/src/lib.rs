//! Core resolution engine for Rabt.
//!
//! Bindings map keys to factories and lifetimes, containers resolve keys
//! against their bindings and a parent chain, and scopes cache and dispose
//! what was built.

pub mod binding;
pub mod chain;
pub mod container;
pub mod dependencies;
pub mod error;
pub mod fallback;
pub mod helpers;
pub mod key;
pub mod lifetime;
pub mod locals;
pub mod lookup;
pub mod provider;
pub mod scope;
pub mod value;

pub use binding::{Binding, bind};
pub use container::{Container, ContainerBuilder, ParentContainer, prelude};
pub use error::{RabtError, Result};
pub use key::{Injectable, Key};
pub use scope::Scope;
