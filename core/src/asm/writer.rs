use core::fmt;

use crate::vm::Code;

/// Width of the instruction column before the `;` source position.
const INSTRUCTION_WIDTH: usize = 28;

/// Displays a [`Code`] value in its assembly form.
pub struct Listing<'a>(pub &'a Code);

/// Render `code` as an assembly listing that [`parse_asm`](super::parse_asm)
/// reads back into an equal value.
pub fn to_asm(code: &Code) -> String {
    Listing(code).to_string()
}

impl fmt::Display for Listing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = self.0;
        writeln!(f, ".entry {}", code.entry)?;
        for function in &code.functions {
            writeln!(
                f,
                ".function {} entry={} end={} arity={} slots={}",
                function.name, function.entry, function.end, function.arity, function.slots
            )?;
            for local in &function.locals {
                writeln!(
                    f,
                    ".local {} {} {} {}..{}",
                    function.name, local.name, local.slot, local.live.start, local.live.end
                )?;
            }
        }

        for (offset, instr) in code.instructions.iter().enumerate() {
            if let Some(function) = code.functions.iter().find(|func| func.entry == offset) {
                writeln!(f)?;
                writeln!(f, "# fn {}", function.name)?;
            }
            let text = instr.to_string();
            match code.position(offset) {
                Some(pos) => writeln!(
                    f,
                    "    {:<width$} ; {:<7} # {}",
                    text,
                    pos.to_string(),
                    offset,
                    width = INSTRUCTION_WIDTH
                )?,
                None => writeln!(f, "    {:<width$} # {}", text, offset, width = INSTRUCTION_WIDTH)?,
            }
        }
        Ok(())
    }
}
