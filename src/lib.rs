#[macro_use]
extern crate lazy_static;

#[macro_use]
extern crate derivative;

#[cfg(test)]
#[macro_use]
extern crate indoc;

#[macro_use]
extern crate serde_json;

mod util;

pub mod compiler;
pub mod tools;
