//! Layout IR shared by the defc compiler and the emitters that consume it.
//!
//! Every definition file compiles into one [`Definition`]; its fields carry
//! resolved types, their placement in the target view and an enumerated
//! codec policy.
//!
//! ```
//! use defc_schema::*;
//!
//! // 3 elements put VALUE_INVALID at 3, which needs 2 bits, stored in a byte.
//! assert_eq!(bits_for_value(3), 2);
//! assert_eq!(underlying_for_bits(bits_for_value(3)), Some(PrimitiveType::UInt8));
//! assert_eq!(PrimitiveType::from_name("uint16_t").map(|p| p.byte_size()), Some(2));
//! ```

pub mod definition;
pub mod field;
pub mod policy;
pub mod primitive;

pub use definition::*;
pub use field::*;
pub use policy::*;
pub use primitive::*;
