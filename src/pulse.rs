//! Waveform definitions and the pulse registry.
//!
//! A [`Pulse`] is a named, ordered, non-empty sequence of
//! [`PulseElement`]s; each element describes one fixed 100 ms slice of
//! device output. Pulses are immutable once constructed and shared as
//! `Rc<Pulse>`, so a running streaming job can never observe a half-updated
//! waveform — changing a channel's pulse always swaps the whole handle.
//!
//! Pattern values are passed through unvalidated: range enforcement
//! (frequency 10–240, intensity 0–100) belongs to the authoring/parsing
//! layer that produced them.

use std::collections::HashMap;
use std::rc::Rc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::PulseError;

/// Four frequency values covering one element's time slice.
pub type FrequencyPattern = [u8; 4];

/// Four intensity values covering one element's time slice.
pub type IntensityPattern = [u8; 4];

/// One fixed time slice of output: a frequency pattern paired with an
/// intensity pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulseElement {
    pub frequency: FrequencyPattern,
    pub intensity: IntensityPattern,
}

impl PulseElement {
    /// Silent output at the device's lowest valid frequency.
    pub const REST: PulseElement = PulseElement {
        frequency: [10; 4],
        intensity: [0; 4],
    };

    pub fn new(frequency: FrequencyPattern, intensity: IntensityPattern) -> Self {
        Self {
            frequency,
            intensity,
        }
    }
}

/// A named waveform definition consumed by the streaming scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pulse {
    name: String,
    elements: Vec<PulseElement>,
}

impl Pulse {
    /// Construct a pulse. Rejects empty element sequences — a pulse with
    /// nothing to play cannot drive the batch arithmetic.
    pub fn new(name: impl Into<String>, elements: Vec<PulseElement>) -> Result<Self, PulseError> {
        if elements.is_empty() {
            return Err(PulseError::EmptyElements);
        }
        Ok(Self {
            name: name.into(),
            elements,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn elements(&self) -> &[PulseElement] {
        &self.elements
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }
}

/// Name- and index-addressed pulse collection.
///
/// Owned by the embedding application; the session core only ever holds
/// `Rc<Pulse>` handles resolved through this registry.
pub struct PulseRegistry {
    pulses: Vec<Rc<Pulse>>,
    by_name: HashMap<String, usize>,
}

impl PulseRegistry {
    pub fn new() -> Self {
        Self {
            pulses: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Register a pulse, returning its shared handle. A pulse re-registered
    /// under an existing name shadows the old name binding; the old handle
    /// stays valid for any stream still holding it.
    pub fn register(&mut self, pulse: Pulse) -> Rc<Pulse> {
        let handle = Rc::new(pulse);
        let index = self.pulses.len();
        self.by_name.insert(handle.name().to_string(), index);
        self.pulses.push(handle.clone());
        debug!("registered pulse '{}' at index {}", handle.name(), index);
        handle
    }

    pub fn by_index(&self, index: usize) -> Option<Rc<Pulse>> {
        self.pulses.get(index).cloned()
    }

    pub fn by_name(&self, name: &str) -> Option<Rc<Pulse>> {
        self.by_name
            .get(name)
            .and_then(|&index| self.pulses.get(index))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.pulses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pulses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<Pulse>> {
        self.pulses.iter()
    }
}

impl Default for PulseRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
