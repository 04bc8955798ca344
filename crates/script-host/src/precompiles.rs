//! Precompiles installed by the host at script-visible addresses.
//!
//! A precompile here is a native callable bound to an address: scripts call it like a contract and
//! the host answers from Rust. [`PrecompileTable`] tracks which binding currently owns each
//! address, so that removing a binding never tears down one installed later at the same address.

use std::{collections::HashMap, fmt, rc::Rc};

use alloy_primitives::{Address, U256};
use revm::precompile::PrecompileResult;

use crate::{host::BindingId, ScriptError};

/// Input for a precompile call.
#[derive(Debug, Clone, Copy)]
pub struct PrecompileInput<'a> {
    /// Input data bytes.
    pub data: &'a [u8],
    /// Gas limit.
    pub gas: u64,
    /// Caller address.
    pub caller: Address,
    /// Value sent with the call.
    pub value: U256,
}

/// Trait for implementing precompiled contracts.
#[auto_impl::auto_impl(Rc)]
pub trait Precompile {
    /// Execute the precompile with the given input data, gas limit, and caller address.
    fn call(&self, input: PrecompileInput<'_>) -> PrecompileResult;
}

impl<F> Precompile for F
where
    F: Fn(PrecompileInput<'_>) -> PrecompileResult,
{
    fn call(&self, input: PrecompileInput<'_>) -> PrecompileResult {
        self(input)
    }
}

/// A type-erased precompile, cheap to clone.
#[derive(Clone)]
pub struct DynPrecompile(Rc<dyn Precompile>);

impl DynPrecompile {
    /// Creates a new [`DynPrecompile`] with the given closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(PrecompileInput<'_>) -> PrecompileResult + 'static,
    {
        Self(Rc::new(f))
    }

    /// Wraps any [`Precompile`] implementation.
    pub fn from_precompile<P: Precompile + 'static>(precompile: P) -> Self {
        Self(Rc::new(precompile))
    }
}

impl fmt::Debug for DynPrecompile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynPrecompile").finish_non_exhaustive()
    }
}

impl Precompile for DynPrecompile {
    fn call(&self, input: PrecompileInput<'_>) -> PrecompileResult {
        self.0.call(input)
    }
}

/// The precompiles currently installed, keyed by address.
#[derive(Debug, Default)]
pub struct PrecompileTable {
    entries: HashMap<Address, (BindingId, DynPrecompile)>,
    next_binding: u64,
}

impl PrecompileTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `precompile` at `address` and returns the id of the new binding.
    ///
    /// Fails with [`ScriptError::AddressCollision`] if the address is taken; the table is left
    /// unchanged in that case.
    pub fn insert(
        &mut self,
        address: Address,
        precompile: DynPrecompile,
    ) -> Result<BindingId, ScriptError> {
        if self.entries.contains_key(&address) {
            return Err(ScriptError::AddressCollision { address });
        }
        self.next_binding += 1;
        let id = BindingId(self.next_binding);
        self.entries.insert(address, (id, precompile));
        Ok(id)
    }

    /// Removes the binding `id` from `address`. Returns `false` if the address holds no binding
    /// or a different one.
    pub fn remove(&mut self, address: Address, id: BindingId) -> bool {
        match self.entries.get(&address) {
            Some((current, _)) if *current == id => {
                self.entries.remove(&address);
                true
            }
            _ => false,
        }
    }

    /// The precompile installed at `address`.
    pub fn get(&self, address: &Address) -> Option<&DynPrecompile> {
        self.entries.get(address).map(|(_, precompile)| precompile)
    }

    /// The binding currently installed at `address`.
    pub fn binding(&self, address: &Address) -> Option<BindingId> {
        self.entries.get(address).map(|(id, _)| *id)
    }

    /// Whether a precompile is installed at `address`.
    pub fn contains(&self, address: &Address) -> bool {
        self.entries.contains_key(address)
    }

    /// Number of installed precompiles.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no precompile is installed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, Bytes};
    use revm::precompile::PrecompileOutput;

    fn echo() -> DynPrecompile {
        DynPrecompile::new(|input: PrecompileInput<'_>| {
            Ok(PrecompileOutput {
                gas_used: 10,
                bytes: Bytes::copy_from_slice(input.data),
                reverted: false,
            })
        })
    }

    fn input(data: &[u8]) -> PrecompileInput<'_> {
        PrecompileInput { data, gas: 1_000, caller: Address::ZERO, value: U256::ZERO }
    }

    #[test]
    fn test_dyn_precompile_call() {
        let precompile = echo();
        let output = precompile.call(input(&[1, 2, 3])).unwrap();
        assert_eq!(output.bytes, Bytes::from(vec![1, 2, 3]));
        assert_eq!(output.gas_used, 10);
    }

    #[test]
    fn test_insert_collision_leaves_table_unchanged() {
        let address = address!("0x0000000000000000000000000000000000000100");
        let mut table = PrecompileTable::new();
        let first = table.insert(address, echo()).unwrap();

        let err = table.insert(address, echo()).unwrap_err();
        assert!(matches!(err, ScriptError::AddressCollision { address: a } if a == address));
        assert_eq!(table.binding(&address), Some(first));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_remove_only_matching_binding() {
        let address = address!("0x0000000000000000000000000000000000000100");
        let mut table = PrecompileTable::new();
        let first = table.insert(address, echo()).unwrap();
        assert!(table.remove(address, first));
        assert!(!table.remove(address, first));

        let second = table.insert(address, echo()).unwrap();
        assert_ne!(first, second);
        assert!(!table.remove(address, first));
        assert!(table.contains(&address));
        assert!(table.remove(address, second));
        assert!(table.is_empty());
    }
}
