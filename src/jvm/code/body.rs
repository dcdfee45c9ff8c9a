use crate::jvm::class_file::{
    self, Attribute, BytecodeArray, BytecodeIndex, ExceptionHandler, LineNumberTable,
    LocalVariable, LocalVariableTable, LocalVariableTypeTable, StackMapTable,
};
use crate::jvm::code::{
    decode_instructions, lay_out, CodeInstruction, DecodedCode, InsnIndex, Instruction,
};
use crate::jvm::verifier::{analyze_stack, locals_used, Frame, VerificationType};
use crate::jvm::{
    ClassConstantIndex, ConstantIndex, ConstantsPool, Error, MalformedKind, MethodDescriptor,
};
use log::debug;
use std::convert::Infallible;

/// What a method body needs to know about the method it belongs to
#[derive(Debug, Clone, Copy)]
pub struct MethodContext<'a> {
    /// Binary name of the declaring class
    pub class_name: &'a str,
    pub name: &'a str,
    pub descriptor: &'a MethodDescriptor,
    pub is_static: bool,
}

impl<'a> MethodContext<'a> {
    /// Frame on entry to the method
    pub fn initial_frame(&self) -> Frame<String, InsnIndex> {
        Frame::initial(self.class_name, self.name, self.descriptor, self.is_static)
    }
}

/// Exception handler, with bounds given as instruction indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionRange {
    /// First instruction covered (inclusive)
    pub start: InsnIndex,

    /// End of the covered instructions (exclusive)
    pub end: InsnIndex,

    /// First instruction of the handler
    pub handler: InsnIndex,

    /// `None` catches everything
    pub catch_type: Option<ClassConstantIndex>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineNumberEntry {
    pub start: InsnIndex,
    pub line: u16,
}

/// Debug information about a local variable
///
/// In a `LocalVariableTypeTable`, `descriptor` holds the generic signature instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariableEntry {
    pub slot: u16,
    pub name: String,
    pub descriptor: String,

    /// First instruction where the variable has a value
    pub start: InsnIndex,

    /// End of the scope (exclusive)
    pub end: InsnIndex,
}

impl LocalVariableEntry {
    /// Number of slots the variable occupies
    pub fn width(&self) -> usize {
        match self.descriptor.as_str() {
            "J" | "D" => 2,
            _ => 1,
        }
    }
}

/// Editable representation of a `Code` attribute
///
/// Everything that refers to a position in the code (jumps, exception ranges, debug tables, stack
/// map frames) refers to an instruction index, so that inserting instructions is just a matter of
/// shifting indices. Byte offsets are recomputed when the body is encoded again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodBody {
    /// As found in the class file (recomputed on encoding)
    pub max_stack: u16,

    /// As found in the class file (recomputed on encoding)
    pub max_locals: u16,

    pub instructions: Vec<CodeInstruction>,
    pub exception_table: Vec<ExceptionRange>,
    pub line_numbers: Vec<LineNumberEntry>,
    pub local_variables: Vec<LocalVariableEntry>,
    pub local_variable_types: Vec<LocalVariableEntry>,

    /// Expanded stack map frames, sorted by position (`None` if there was no `StackMapTable`)
    pub frames: Option<Vec<(InsnIndex, Frame<String, InsnIndex>)>>,

    /// Attributes of the code we don't interpret
    pub other_attributes: Vec<Attribute>,
}

/// These refer to bytecode offsets in ways we don't track, so they can't survive an edit
const TYPE_ANNOTATIONS: [&str; 2] = [
    "RuntimeVisibleTypeAnnotations",
    "RuntimeInvisibleTypeAnnotations",
];

impl MethodBody {
    /// Decode a `Code` attribute
    pub fn decode(
        code: &class_file::Code,
        constants: &ConstantsPool,
        context: &MethodContext,
    ) -> Result<MethodBody, Error> {
        let decoded = decode_instructions(&code.code_array.0, constants)?;
        let locate = |offset: u16| -> Result<InsnIndex, Error> {
            decoded
                .start_at(offset as usize)
                .ok_or_else(|| Error::malformed(0, MalformedKind::BadCodeOffset(offset as usize)))
        };
        let locate_bound = |offset: usize| -> Result<InsnIndex, Error> {
            decoded
                .bound_at(offset)
                .ok_or_else(|| Error::malformed(0, MalformedKind::BadCodeOffset(offset)))
        };

        let mut exception_table = vec![];
        for handler in &code.exception_table {
            let start = locate(handler.start_pc.0)?;
            let end = locate_bound(handler.end_pc.0 as usize)?;
            if end <= start {
                return Err(Error::malformed(
                    0,
                    MalformedKind::BadCodeOffset(handler.end_pc.0 as usize),
                ));
            }
            let catch_type = if handler.catch_type.0 .0 == 0 {
                None
            } else {
                constants
                    .class_name(handler.catch_type)
                    .map_err(|kind| Error::malformed(0, kind))?;
                Some(handler.catch_type)
            };
            exception_table.push(ExceptionRange {
                start,
                end,
                handler: locate(handler.handler_pc.0)?,
                catch_type,
            });
        }

        let mut line_numbers = vec![];
        let mut local_variables = vec![];
        let mut local_variable_types = vec![];
        let mut frames = None;
        let mut other_attributes = vec![];

        for attribute in &code.attributes {
            let name = attribute
                .name(constants)
                .map_err(|kind| Error::malformed(0, kind))?;
            match name {
                "LineNumberTable" => {
                    for entry in attribute.decode::<LineNumberTable>()?.0 {
                        line_numbers.push(LineNumberEntry {
                            start: locate(entry.start_pc.0)?,
                            line: entry.line_number,
                        });
                    }
                }
                "LocalVariableTable" => {
                    for entry in attribute.decode::<LocalVariableTable>()?.0 {
                        local_variables.push(decode_local(&entry, constants, &locate_bound)?);
                    }
                }
                "LocalVariableTypeTable" => {
                    for entry in attribute.decode::<LocalVariableTypeTable>()?.0 {
                        local_variable_types.push(decode_local(&entry, constants, &locate_bound)?);
                    }
                }
                "StackMapTable" => {
                    if frames.is_some() {
                        let msg = "more than one StackMapTable".to_owned();
                        return Err(Error::malformed(0, MalformedKind::BadFrame(msg)));
                    }
                    let table = attribute.decode::<StackMapTable>()?;
                    frames = Some(decode_frames(&table, &decoded, constants, context)?);
                }
                _ => other_attributes.push(attribute.clone()),
            }
        }

        Ok(MethodBody {
            max_stack: code.max_stack,
            max_locals: code.max_locals,
            instructions: decoded.instructions,
            exception_table,
            line_numbers,
            local_variables,
            local_variable_types,
            frames,
            other_attributes,
        })
    }

    /// Splice instructions in right before the instruction at `at`
    ///
    /// Anything that referred to position `at` (a jump target, the start of an exception range or
    /// of a variable scope, a frame) now refers to the first inserted instruction, so every path
    /// that used to reach the instruction at `at` runs the inserted code first. Positions after
    /// `at` move along with their instruction.
    pub fn insert(&mut self, at: InsnIndex, instructions: Vec<CodeInstruction>) {
        let count = instructions.len();
        let shift = |index: &mut InsnIndex| {
            if index.0 > at.0 {
                index.0 += count;
            }
        };

        for insn in &mut self.instructions {
            insn.shift_targets(InsnIndex(at.0 + 1), count);
        }
        for range in &mut self.exception_table {
            shift(&mut range.start);
            shift(&mut range.end);
            shift(&mut range.handler);
        }
        for line in &mut self.line_numbers {
            shift(&mut line.start);
        }
        for local in self
            .local_variables
            .iter_mut()
            .chain(self.local_variable_types.iter_mut())
        {
            shift(&mut local.start);
            shift(&mut local.end);
        }
        if let Some(frames) = &mut self.frames {
            for (index, frame) in frames.iter_mut() {
                shift(index);

                // `uninitialized` types name the `new` instruction itself
                let moved = frame.map(|vtype| {
                    vtype.map(
                        |cls| Ok::<String, Infallible>(cls.clone()),
                        |new_insn| {
                            Ok(if new_insn.0 >= at.0 {
                                InsnIndex(new_insn.0 + count)
                            } else {
                                *new_insn
                            })
                        },
                    )
                });
                *frame = match moved {
                    Ok(moved) => moved,
                    Err(never) => match never {},
                };
            }
        }

        self.instructions.splice(at.0..at.0, instructions);
    }

    /// Number of local variable slots the method needs
    ///
    /// Covers the parameters, every slot an instruction accesses, every slot a frame describes and
    /// every slot with debug information.
    pub fn compute_max_locals(&self, context: &MethodContext) -> usize {
        let parameters = context.descriptor.parameter_length(!context.is_static);
        let accessed = locals_used(&self.instructions);
        let in_frames = self
            .frames
            .iter()
            .flatten()
            .map(|(_, frame)| frame.locals_len())
            .max()
            .unwrap_or(0);
        let in_debug_info = self
            .local_variables
            .iter()
            .map(|local| local.slot as usize + local.width())
            .max()
            .unwrap_or(0);
        parameters.max(accessed).max(in_frames).max(in_debug_info)
    }

    /// Encode the body back into a `Code` attribute, recomputing everything derived from the code
    ///
    /// Constants needed by the debug tables and frames are added to `constants` (when they aren't
    /// already there).
    pub fn encode(
        &self,
        constants: &mut ConstantsPool,
        context: &MethodContext,
    ) -> Result<class_file::Code, Error> {
        let layout = lay_out(&self.instructions)?;
        let stack = analyze_stack(&self.instructions, &self.exception_table, constants)?;

        let max_stack = u16::try_from(stack.max_stack)
            .map_err(|_| Error::MethodCodeMaxStackOverflow(stack.max_stack))?;
        let max_locals = self.compute_max_locals(context);
        let max_locals =
            u16::try_from(max_locals).map_err(|_| Error::MethodCodeMaxLocalsOverflow(max_locals))?;

        let at = |index: InsnIndex| BytecodeIndex(layout.offset_of(index) as u16);

        let exception_table = self
            .exception_table
            .iter()
            .map(|range| ExceptionHandler {
                start_pc: at(range.start),
                end_pc: at(range.end),
                handler_pc: at(range.handler),
                catch_type: range
                    .catch_type
                    .unwrap_or(ClassConstantIndex(ConstantIndex(0))),
            })
            .collect();

        let mut attributes = vec![];

        if !self.line_numbers.is_empty() {
            let table = LineNumberTable(
                self.line_numbers
                    .iter()
                    .map(|line| class_file::LineNumber {
                        start_pc: at(line.start),
                        line_number: line.line,
                    })
                    .collect(),
            );
            attributes.push(constants.get_attribute(&table)?);
        }

        if !self.local_variables.is_empty() {
            let entries = encode_locals(&self.local_variables, constants, &at)?;
            attributes.push(constants.get_attribute(&LocalVariableTable(entries))?);
        }

        if !self.local_variable_types.is_empty() {
            let entries = encode_locals(&self.local_variable_types, constants, &at)?;
            attributes.push(constants.get_attribute(&LocalVariableTypeTable(entries))?);
        }

        if let Some(frames) = &self.frames {
            let mut previous_frame = context.initial_frame();
            let mut previous_offset: Option<usize> = None;
            let mut stack_map_frames = vec![];
            for (index, frame) in frames {
                let offset = layout.offset_of(*index);
                let offset_delta = match previous_offset {
                    None => offset,
                    Some(previous_offset) => offset - previous_offset - 1,
                };
                let compressed = frame.stack_map_frame(offset_delta as u16, &previous_frame);
                let resolved = compressed.map(|vtype| {
                    vtype.map(
                        |cls| constants.get_class(cls),
                        |new_insn| Ok(layout.offset_of(*new_insn) as u16),
                    )
                })?;
                stack_map_frames.push(resolved);

                previous_frame = frame.clone();
                previous_offset = Some(offset);
            }
            attributes.push(constants.get_attribute(&StackMapTable(stack_map_frames))?);
        }

        for attribute in &self.other_attributes {
            let name = attribute
                .name(constants)
                .map_err(|kind| Error::malformed(0, kind))?;
            if TYPE_ANNOTATIONS.contains(&name) {
                debug!("dropping {} from {}.{}", name, context.class_name, context.name);
                continue;
            }
            attributes.push(attribute.clone());
        }

        Ok(class_file::Code {
            max_stack,
            max_locals,
            code_array: BytecodeArray(layout.code.clone()),
            exception_table,
            attributes,
        })
    }

    /// Position of the first instruction matching the predicate
    pub fn find(&self, predicate: impl Fn(&CodeInstruction) -> bool) -> Option<InsnIndex> {
        self.instructions.iter().position(predicate).map(InsnIndex)
    }
}

fn decode_local(
    entry: &LocalVariable,
    constants: &ConstantsPool,
    locate_bound: &impl Fn(usize) -> Result<InsnIndex, Error>,
) -> Result<LocalVariableEntry, Error> {
    let start_pc = entry.start_pc.0 as usize;
    let start = locate_bound(start_pc)?;
    let end = locate_bound(start_pc + entry.length as usize)?;
    let name = constants
        .utf8(entry.name_index)
        .map_err(|kind| Error::malformed(0, kind))?;
    let descriptor = constants
        .utf8(entry.descriptor_index)
        .map_err(|kind| Error::malformed(0, kind))?;
    Ok(LocalVariableEntry {
        slot: entry.index,
        name: name.to_owned(),
        descriptor: descriptor.to_owned(),
        start,
        end,
    })
}

fn encode_locals(
    locals: &[LocalVariableEntry],
    constants: &mut ConstantsPool,
    at: &impl Fn(InsnIndex) -> BytecodeIndex,
) -> Result<Vec<LocalVariable>, Error> {
    locals
        .iter()
        .map(|local| {
            let start_pc = at(local.start);
            let end_pc = at(local.end);
            Ok(LocalVariable {
                start_pc,
                length: end_pc.0 - start_pc.0,
                name_index: constants.get_utf8(&local.name)?,
                descriptor_index: constants.get_utf8(&local.descriptor)?,
                index: local.slot,
            })
        })
        .collect()
}

/// Expand the frames of a `StackMapTable`, relative to the initial frame of the method
fn decode_frames(
    table: &StackMapTable,
    decoded: &DecodedCode,
    constants: &ConstantsPool,
    context: &MethodContext,
) -> Result<Vec<(InsnIndex, Frame<String, InsnIndex>)>, Error> {
    let bad_frame = |msg: String| Error::malformed(0, MalformedKind::BadFrame(msg));

    let mut frames: Vec<(InsnIndex, Frame<String, InsnIndex>)> = vec![];
    let mut previous_frame = context.initial_frame();
    let mut previous_offset: Option<usize> = None;

    for compressed in &table.0 {
        let offset_delta = compressed.offset_delta() as usize;
        let offset = match previous_offset {
            None => offset_delta,
            Some(previous_offset) => previous_offset + offset_delta + 1,
        };
        let index = decoded
            .start_at(offset)
            .ok_or_else(|| bad_frame(format!("frame at offset {} is inside an instruction", offset)))?;

        let compressed = compressed.map(|vtype| -> Result<VerificationType<String, InsnIndex>, Error> {
            let vtype = vtype
                .resolve_class(constants)
                .map_err(|kind| Error::malformed(0, kind))?;
            vtype.map(
                |cls| Ok(cls.clone()),
                |new_offset| {
                    let new_insn = decoded.start_at(*new_offset as usize);
                    match new_insn {
                        Some(new_insn)
                            if matches!(
                                decoded.instructions[new_insn.0],
                                CodeInstruction::Regular(Instruction::New(_))
                            ) =>
                        {
                            Ok(new_insn)
                        }
                        _ => Err(bad_frame(format!(
                            "uninitialized type at offset {} is not a `new`",
                            new_offset
                        ))),
                    }
                },
            )
        })?;

        let frame = previous_frame
            .expand(&compressed)
            .map_err(|kind| Error::malformed(0, kind))?;
        frames.push((index, frame.clone()));
        previous_frame = frame;
        previous_offset = Some(offset);
    }

    Ok(frames)
}
