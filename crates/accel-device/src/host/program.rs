//! Kernel programs for the host device
//!
//! A program is a named set of kernels plus the build options it is compiled
//! with. Programs built from OpenCL C source bind every declared entry point
//! to its host implementation. Building validates the options and the entry
//! points and produces the kernel registry the device resolves names
//! against; a failed build reports the build status, the options and the
//! build log.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use accel_core::{Error, Result};
use tracing::debug;

use super::kernels::{HostKernel, ReduceKernel, ReduceOp, SortKernel, StdDevKernel};
use crate::codes::CL_BUILD_ERROR;
use crate::source::KernelSource;

/// Option prefixes an OpenCL C compiler accepts
const KNOWN_OPTIONS: [&str; 5] = ["-D", "-I", "-cl-", "-w", "-Werror"];

/// Unbuilt program: kernels by entry point name plus build options
#[derive(Clone, Default)]
pub struct HostProgram {
    kernels: BTreeMap<String, Arc<dyn HostKernel>>,
    options: String,
    origin: Option<String>,
    /// Entry points declared in source with no host implementation
    unresolved: Vec<String>,
}

impl HostProgram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Program for the entry points `source` declares
    pub fn from_source(source: &KernelSource) -> Self {
        let reference = Self::reference();
        let mut program = Self {
            origin: Some(source.origin().to_string()),
            ..Self::default()
        };
        for name in source.kernel_names() {
            match reference.kernels.get(&name) {
                Some(kernel) => {
                    program.kernels.insert(name, Arc::clone(kernel));
                }
                None => program.unresolved.push(name),
            }
        }
        program
    }

    /// Program holding every statistics kernel for both element types
    ///
    /// `min`, `max` and `sum` exist in flat form for both types and in
    /// work-group recursive form for floats only. `std` and `sort` exist once
    /// per type.
    pub fn reference() -> Self {
        let mut program = Self::new();
        for (stat, op) in [
            ("min", ReduceOp::Min),
            ("max", ReduceOp::Max),
            ("sum", ReduceOp::Sum),
        ] {
            program = program
                .with_kernel(format!("{stat}_INT"), ReduceKernel::<i32>::flat(op))
                .with_kernel(format!("{stat}_FLOAT"), ReduceKernel::<f32>::flat(op))
                .with_kernel(
                    format!("{stat}_WG_REDUCE_FLOAT"),
                    ReduceKernel::<f32>::recursive(op),
                );
        }
        program
            .with_kernel("std_INT", StdDevKernel::<i32>::sum_of_squares())
            .with_kernel("std_FLOAT", StdDevKernel::<f32>::finished())
            .with_kernel("sort_INT", SortKernel::<i32>::new())
            .with_kernel("sort_FLOAT", SortKernel::<f32>::new())
    }

    pub fn with_kernel(mut self, name: impl Into<String>, kernel: impl HostKernel + 'static) -> Self {
        self.kernels.insert(name.into(), Arc::new(kernel));
        self
    }

    /// Drop a kernel by name, returning the reduced program
    pub fn without_kernel(mut self, name: &str) -> Self {
        self.kernels.remove(name);
        self
    }

    pub fn with_options(mut self, options: impl Into<String>) -> Self {
        self.options = options.into();
        self
    }

    pub fn options(&self) -> &str {
        &self.options
    }

    pub fn kernel_names(&self) -> impl Iterator<Item = &str> {
        self.kernels.keys().map(String::as_str)
    }

    /// Build the program, validating its options
    pub fn build(&self) -> Result<BuiltProgram> {
        let mut log: Vec<String> = self
            .options
            .split_whitespace()
            .filter(|opt| !KNOWN_OPTIONS.iter().any(|known| opt.starts_with(known)))
            .map(|opt| format!("error: unknown build option '{opt}'"))
            .collect();

        if let Some(origin) = &self.origin {
            log.extend(self.unresolved.iter().map(|name| {
                format!("{origin}: error: no host implementation for kernel '{name}'")
            }));
            if self.kernels.is_empty() && self.unresolved.is_empty() {
                log.push(format!("{origin}: error: program declares no kernels"));
            }
        }

        if !log.is_empty() {
            return Err(Error::Build {
                status: CL_BUILD_ERROR,
                options: self.options.clone(),
                log: log.join("\n"),
            });
        }

        debug!(
            "Built program with {} kernels, options '{}'",
            self.kernels.len(),
            self.options
        );
        Ok(BuiltProgram {
            kernels: self.kernels.clone(),
        })
    }
}

impl fmt::Debug for HostProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostProgram")
            .field("kernels", &self.kernels.keys().collect::<Vec<_>>())
            .field("options", &self.options)
            .field("origin", &self.origin)
            .finish()
    }
}

/// Built program the device looks kernels up in
#[derive(Clone, Debug, Default)]
pub struct BuiltProgram {
    kernels: BTreeMap<String, Arc<dyn HostKernel>>,
}

impl BuiltProgram {
    pub fn kernel(&self, name: &str) -> Option<Arc<dyn HostKernel>> {
        self.kernels.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kernels.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }
}
