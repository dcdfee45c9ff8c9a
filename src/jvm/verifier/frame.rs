use super::VerificationType;
use crate::jvm::class_file::StackMapFrame;
use crate::jvm::{MalformedKind, MethodDescriptor, CONSTRUCTOR_NAME, OBJECT_CLASS};
use crate::util::OffsetVec;

/// Snapshot of the stack and local variables at a point in the bytecode
///
/// Method bodies keep one full frame per `StackMapTable` entry. The compressed forms only exist in
/// the class file: they are expanded when a body is decoded and recomputed when it is encoded.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct Frame<Cls, U> {
    /// Local variables in scope
    pub locals: OffsetVec<VerificationType<Cls, U>>,

    /// Types of values on the stack
    pub stack: OffsetVec<VerificationType<Cls, U>>,
}

impl<U> Frame<String, U> {
    /// Frame implied by the method descriptor, on entry to the method
    ///
    /// Constructors start with an uninitialized `this`, except for the one on `java/lang/Object`
    /// which has no superclass constructor to call.
    pub fn initial(
        class_name: &str,
        method_name: &str,
        descriptor: &MethodDescriptor,
        is_static: bool,
    ) -> Frame<String, U> {
        let mut locals = OffsetVec::new();
        if !is_static {
            if method_name == CONSTRUCTOR_NAME && class_name != OBJECT_CLASS {
                locals.push(VerificationType::UninitializedThis);
            } else {
                locals.push(VerificationType::Object(class_name.to_owned()));
            }
        }
        for parameter in &descriptor.parameters {
            locals.push(VerificationType::from(parameter));
        }
        Frame {
            locals,
            stack: OffsetVec::new(),
        }
    }
}

impl<Cls: Clone, U: Clone> Frame<Cls, U> {
    /// Apply a compressed stack map frame on top of this (previous) frame
    pub fn expand(&self, compressed: &StackMapFrame<Cls, U>) -> Result<Frame<Cls, U>, MalformedKind> {
        let locals = match compressed {
            StackMapFrame::SameLocalsNoStack { .. } | StackMapFrame::SameLocalsOneStack { .. } => {
                self.locals.clone()
            }
            StackMapFrame::ChopLocalsNoStack { chopped_k, .. } => {
                let chopped_k = *chopped_k as usize;
                if chopped_k > self.locals.len() {
                    return Err(MalformedKind::BadFrame(format!(
                        "cannot chop {} locals from {}",
                        chopped_k,
                        self.locals.len()
                    )));
                }
                let mut locals = self.locals.clone();
                locals.truncate(self.locals.len() - chopped_k);
                locals
            }
            StackMapFrame::AppendLocalsNoStack { locals: added, .. } => {
                let mut locals = self.locals.clone();
                locals.extend(added.iter().cloned());
                locals
            }
            StackMapFrame::Full { locals, .. } => locals.iter().cloned().collect(),
        };
        let stack = match compressed {
            StackMapFrame::SameLocalsOneStack { stack, .. } => {
                std::iter::once(stack.clone()).collect()
            }
            StackMapFrame::Full { stack, .. } => stack.iter().cloned().collect(),
            _ => OffsetVec::new(),
        };
        Ok(Frame { locals, stack })
    }
}

impl<Cls: Clone + Eq, U: Clone + Eq> Frame<Cls, U> {
    /// Compute a stack map frame for this frame, given the previous frame
    ///
    /// This will fall back to the `Full` option using [`Self::full_stack_map_frame`] only if none
    /// of the other stack map frame variants are enough to encode the transition.
    pub fn stack_map_frame(&self, offset_delta: u16, previous_frame: &Self) -> StackMapFrame<Cls, U> {
        match self.stack.len() {
            0 => {
                let this_locals_len = self.locals.len();
                let prev_locals_len = previous_frame.locals.len();

                if this_locals_len <= prev_locals_len {
                    let len_difference = prev_locals_len - this_locals_len;
                    if len_difference < 4 {
                        let this_is_prefix_of_prev = self
                            .locals
                            .values()
                            .zip(previous_frame.locals.values())
                            .all(|(t1, t2)| t1 == t2);

                        if this_is_prefix_of_prev {
                            if len_difference == 0 {
                                return StackMapFrame::SameLocalsNoStack { offset_delta };
                            } else {
                                return StackMapFrame::ChopLocalsNoStack {
                                    offset_delta,
                                    chopped_k: len_difference as u8,
                                };
                            }
                        }
                    }
                } else if this_locals_len - prev_locals_len < 4 {
                    let prev_is_prefix_of_this = previous_frame
                        .locals
                        .values()
                        .zip(self.locals.values())
                        .all(|(t1, t2)| t1 == t2);

                    if prev_is_prefix_of_this {
                        return StackMapFrame::AppendLocalsNoStack {
                            offset_delta,
                            locals: self.locals.values().skip(prev_locals_len).cloned().collect(),
                        };
                    }
                }
            }
            1 if self.locals == previous_frame.locals => {
                if let Some(stack) = self.stack.values().next() {
                    return StackMapFrame::SameLocalsOneStack {
                        offset_delta,
                        stack: stack.clone(),
                    };
                }
            }
            _ => (),
        }

        self.full_stack_map_frame(offset_delta)
    }

    /// Compute a `Full` stack map frame
    pub fn full_stack_map_frame(&self, offset_delta: u16) -> StackMapFrame<Cls, U> {
        StackMapFrame::Full {
            offset_delta,
            stack: self.stack.values().cloned().collect(),
            locals: self.locals.values().cloned().collect(),
        }
    }
}

impl<Cls, U> Frame<Cls, U> {
    /// Number of local variable slots the frame needs
    pub fn locals_len(&self) -> usize {
        self.locals.offset_len().0
    }

    /// Convert the class and uninitialized representations
    pub fn map<Cls2, U2, E>(
        &self,
        mut map_type: impl FnMut(&VerificationType<Cls, U>) -> Result<VerificationType<Cls2, U2>, E>,
    ) -> Result<Frame<Cls2, U2>, E> {
        Ok(Frame {
            locals: self
                .locals
                .values()
                .map(&mut map_type)
                .collect::<Result<_, E>>()?,
            stack: self
                .stack
                .values()
                .map(&mut map_type)
                .collect::<Result<_, E>>()?,
        })
    }
}
