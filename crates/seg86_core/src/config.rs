/*
    Seg86
    8086/80286 CPU emulation core

    Copyright 2022-2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    ---------------------------------------------------------------------------

    config.rs

    Core configuration, loaded from TOML.

*/


use std::{fs::read_to_string, path::Path};

use anyhow::{Context, Result};
use serde_derive::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::{
    cpu_286::{DEFAULT_EXTRA_SEGMENT, DEFAULT_STACK_BASE, DEFAULT_STACK_SEGMENT},
    cpu_common::MemoryError,
    memory::{
        protected::{DEFAULT_HEAP_BASE_SEGMENT, DEFAULT_REAL_MODE_BASE_SEGMENT},
        real::DEFAULT_REAL_HEAP_SEGMENT,
        MemoryCoreType,
        ProtectedModeMemoryCore,
        RealModeMemoryCore,
    },
};

#[derive(Copy, Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MemoryCoreKind {
    #[default]
    Protected,
    Real,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CpuConfig {
    pub stack_base: u16,
    pub stack_segment: u16,
    pub extra_segment: u16,
    pub trace: bool,
    pub instruction_limit: Option<u64>,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            stack_base: DEFAULT_STACK_BASE,
            stack_segment: DEFAULT_STACK_SEGMENT,
            extra_segment: DEFAULT_EXTRA_SEGMENT,
            trace: false,
            instruction_limit: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MemoryConfig {
    pub core: MemoryCoreKind,
    /// Defaults depend on the core type; see `heap_base_segment()`.
    pub heap_base_segment: Option<u16>,
    pub real_mode_base_segment: u16,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            core: MemoryCoreKind::Protected,
            heap_base_segment: None,
            real_mode_base_segment: DEFAULT_REAL_MODE_BASE_SEGMENT,
        }
    }
}

impl MemoryConfig {
    pub fn heap_base_segment(&self) -> u16 {
        self.heap_base_segment.unwrap_or(match self.core {
            MemoryCoreKind::Protected => DEFAULT_HEAP_BASE_SEGMENT,
            MemoryCoreKind::Real => DEFAULT_REAL_HEAP_SEGMENT,
        })
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CoreConfig {
    pub cpu: CpuConfig,
    pub memory: MemoryConfig,
}

impl CoreConfig {
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: CoreConfig = toml::from_str(toml_str).context("Failed to parse core configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let toml_str =
            read_to_string(path).with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        Self::from_toml_str(&toml_str)
    }

    /// Reject settings the configured memory core cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.memory.core == MemoryCoreKind::Real {
            RealModeMemoryCore::validate_heap_segment(self.memory.heap_base_segment())
                .context("Invalid real mode heap base segment")?;
        }
        Ok(())
    }

    /// Construct the configured memory core.
    pub fn build_memory(&self) -> Result<MemoryCoreType, MemoryError> {
        let heap_base = self.memory.heap_base_segment();
        log::debug!("Building {} memory core with heap base {:04X}", self.memory.core, heap_base);
        Ok(match self.memory.core {
            MemoryCoreKind::Protected => {
                ProtectedModeMemoryCore::with_bases(heap_base, self.memory.real_mode_base_segment).into()
            }
            MemoryCoreKind::Real => RealModeMemoryCore::with_heap_segment(heap_base)?.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::from_toml_str("").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.cpu.stack_base, 0xFFFE);
        assert_eq!(config.memory.heap_base_segment(), DEFAULT_HEAP_BASE_SEGMENT);
    }

    #[test]
    fn test_parse() {
        let config = CoreConfig::from_toml_str(
            r#"
            [cpu]
            stack_base = 0x8000
            trace = true
            instruction_limit = 1000

            [memory]
            core = "real"
            "#,
        )
        .unwrap();
        assert_eq!(config.cpu.stack_base, 0x8000);
        assert!(config.cpu.trace);
        assert_eq!(config.cpu.instruction_limit, Some(1000));
        assert_eq!(config.cpu.extra_segment, DEFAULT_EXTRA_SEGMENT);
        assert_eq!(config.memory.core, MemoryCoreKind::Real);
        assert_eq!(config.memory.heap_base_segment(), DEFAULT_REAL_HEAP_SEGMENT);
        assert!(matches!(config.build_memory(), Ok(MemoryCoreType::RealModeMemoryCore(_))));
    }

    #[test]
    fn test_bad_config() {
        assert!(CoreConfig::from_toml_str("[memory]\ncore = \"paged\"").is_err());
        assert!(CoreConfig::from_toml_str("[memory]\ncore = \"real\"\nheap_base_segment = 0").is_err());

        let mut config = CoreConfig::default();
        config.memory.core = MemoryCoreKind::Real;
        config.memory.heap_base_segment = Some(0);
        assert_eq!(config.build_memory().err(), Some(MemoryError::InvalidHeapSegment(0)));
        assert_eq!(MemoryCoreKind::from_str("Protected").unwrap(), MemoryCoreKind::Protected);
    }
}
