//! Read-only queries against a deployed contract.

use {
    alloy::{
        dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt},
        json_abi::{Function, JsonAbi},
        primitives::{Bytes, hex},
    },
    anyhow::{Context, Result, anyhow},
};

/// A getter without inputs, looked up in a contract ABI.
#[derive(Debug, Clone)]
pub struct Getter {
    function: Function,
}

impl Getter {
    pub fn new(abi: &JsonAbi, name: &str) -> Result<Self> {
        let function = abi
            .function(name)
            .and_then(|overloads| overloads.iter().find(|function| function.inputs.is_empty()))
            .with_context(|| format!("contract has no function {name}() without inputs"))?;
        if function.outputs.is_empty() {
            return Err(anyhow!("function {name}() does not return anything"));
        }
        Ok(Self {
            function: function.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    /// Calldata of the call, which is just the function selector.
    pub fn calldata(&self) -> Result<Bytes> {
        let calldata = self
            .function
            .abi_encode_input(&[])
            .with_context(|| format!("failed to encode call to {}()", self.name()))?;
        Ok(calldata.into())
    }

    /// Decodes the return data of the call and renders its first value for
    /// display.
    pub fn decode(&self, data: &[u8]) -> Result<String> {
        let values = self
            .function
            .abi_decode_output(data)
            .with_context(|| format!("failed to decode result of {}()", self.name()))?;
        let value = values
            .first()
            .with_context(|| format!("{}() returned no values", self.name()))?;
        Ok(render(value))
    }
}

fn render(value: &DynSolValue) -> String {
    match value {
        DynSolValue::String(value) => value.clone(),
        DynSolValue::Address(address) => address.to_checksum(None),
        DynSolValue::Bool(value) => value.to_string(),
        DynSolValue::Uint(value, _) => value.to_string(),
        DynSolValue::Int(value, _) => value.to_string(),
        DynSolValue::Bytes(bytes) => hex::encode_prefixed(bytes),
        DynSolValue::FixedBytes(word, size) => hex::encode_prefixed(&word[..*size]),
        other => format!("{other:?}"),
    }
}
