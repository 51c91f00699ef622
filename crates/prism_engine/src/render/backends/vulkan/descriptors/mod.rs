//! Descriptor set layouts, pools and set construction
//!
//! Three cooperating pieces:
//!
//! - [`DescriptorLayoutCache`] deduplicates set layouts by structure
//! - [`DescriptorAllocator`] hands out sets from a growable list of pools
//! - [`DescriptorBuilder`] collects resource bindings and produces one written set
//!
//! Layout shape (cached, long lived) is kept apart from the concrete buffers
//! and images written into each set.

pub mod allocator;
pub mod builder;
pub mod layout_cache;

pub use allocator::{DescriptorAllocator, PoolSizes};
pub use builder::{BuiltDescriptorSet, DescriptorBuilder, DescriptorResource, DescriptorWrite};
pub use layout_cache::{DescriptorLayoutCache, DescriptorLayoutKey, LayoutBinding};
