use super::BinaryName;
use crate::util::Width;
use std::fmt::{Display, Error as FmtError, Formatter};

/// Primitive value types
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl BaseType {
    fn from_char(c: char) -> Option<BaseType> {
        Some(match c {
            'B' => BaseType::Byte,
            'C' => BaseType::Char,
            'D' => BaseType::Double,
            'F' => BaseType::Float,
            'I' => BaseType::Int,
            'J' => BaseType::Long,
            'S' => BaseType::Short,
            'Z' => BaseType::Boolean,
            _ => return None,
        })
    }

    fn as_char(self) -> char {
        match self {
            BaseType::Byte => 'B',
            BaseType::Char => 'C',
            BaseType::Double => 'D',
            BaseType::Float => 'F',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Short => 'S',
            BaseType::Boolean => 'Z',
        }
    }
}

impl Width for BaseType {
    fn width(&self) -> usize {
        match self {
            BaseType::Double | BaseType::Long => 2,
            _ => 1,
        }
    }
}

/// Type of a field, parameter, or return value
///
/// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.3.2>
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum FieldType {
    Base(BaseType),
    Object(BinaryName),

    /// `dimensions` levels of array (1 to 255) around an element that is not itself an array
    Array {
        dimensions: u8,
        element: Box<FieldType>,
    },
}

impl FieldType {
    pub fn parse(descriptor: &str) -> Result<FieldType, String> {
        let mut cursor = Cursor::new(descriptor);
        let field_type = cursor.field_type()?;
        cursor.finish()?;
        Ok(field_type)
    }

    /// Same type, with every class it mentions passed through `rename`
    pub fn rename_classes(&self, rename: &mut impl FnMut(&BinaryName) -> BinaryName) -> FieldType {
        match self {
            FieldType::Base(base) => FieldType::Base(*base),
            FieldType::Object(class) => FieldType::Object(rename(class)),
            FieldType::Array {
                dimensions,
                element,
            } => FieldType::Array {
                dimensions: *dimensions,
                element: Box::new(element.rename_classes(rename)),
            },
        }
    }
}

impl Width for FieldType {
    fn width(&self) -> usize {
        match self {
            FieldType::Base(base) => base.width(),
            _ => 1,
        }
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            FieldType::Base(base) => write!(f, "{}", base.as_char()),
            FieldType::Object(class) => write!(f, "L{};", class),
            FieldType::Array {
                dimensions,
                element,
            } => {
                for _ in 0..*dimensions {
                    f.write_str("[")?;
                }
                write!(f, "{}", element)
            }
        }
    }
}

/// Parameter and return types of a method
#[derive(PartialEq, Eq, Hash, Debug, Clone)]
pub struct MethodDescriptor {
    pub parameters: Vec<FieldType>,

    /// `None` for `void`
    pub return_type: Option<FieldType>,
}

impl MethodDescriptor {
    pub fn parse(descriptor: &str) -> Result<MethodDescriptor, String> {
        let mut cursor = Cursor::new(descriptor);
        if !cursor.eat('(') {
            return Err(format!("method descriptor '{}' must start with '('", descriptor));
        }
        let mut parameters = vec![];
        while !cursor.eat(')') {
            parameters.push(cursor.field_type()?);
        }
        let return_type = if cursor.eat('V') {
            None
        } else {
            Some(cursor.field_type()?)
        };
        cursor.finish()?;
        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }

    /// Local variable slots taken by the parameters, counting `this` if there is one
    ///
    /// A method is only valid if this is 255 or less.
    pub fn parameter_length(&self, has_this_param: bool) -> usize {
        let params: usize = self.parameters.iter().map(Width::width).sum();
        params + usize::from(has_this_param)
    }

    /// Stack slots taken by the return value
    pub fn return_width(&self) -> usize {
        self.return_type.as_ref().map_or(0, Width::width)
    }

    pub fn rename_classes(&self, mut rename: impl FnMut(&BinaryName) -> BinaryName) -> MethodDescriptor {
        MethodDescriptor {
            parameters: self
                .parameters
                .iter()
                .map(|param| param.rename_classes(&mut rename))
                .collect(),
            return_type: self
                .return_type
                .as_ref()
                .map(|ret| ret.rename_classes(&mut rename)),
        }
    }
}

impl Display for MethodDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str("(")?;
        for parameter in &self.parameters {
            write!(f, "{}", parameter)?;
        }
        f.write_str(")")?;
        match &self.return_type {
            None => f.write_str("V"),
            Some(return_type) => write!(f, "{}", return_type),
        }
    }
}

/// Position in a descriptor being parsed
struct Cursor<'a> {
    descriptor: &'a str,
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(descriptor: &'a str) -> Cursor<'a> {
        Cursor {
            descriptor,
            rest: descriptor,
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        match self.rest.strip_prefix(expected) {
            Some(rest) => {
                self.rest = rest;
                true
            }
            None => false,
        }
    }

    fn next(&mut self) -> Option<char> {
        let c = self.rest.chars().next()?;
        self.rest = &self.rest[c.len_utf8()..];
        Some(c)
    }

    fn field_type(&mut self) -> Result<FieldType, String> {
        let mut dimensions = 0usize;
        while self.eat('[') {
            dimensions += 1;
        }
        let element = match self.next() {
            Some('L') => {
                let end = self
                    .rest
                    .find(';')
                    .ok_or_else(|| format!("unterminated class name in '{}'", self.descriptor))?;
                let class = BinaryName::new(self.rest[..end].to_owned())?;
                self.rest = &self.rest[end + 1..];
                FieldType::Object(class)
            }
            Some(c) => match BaseType::from_char(c) {
                Some(base) => FieldType::Base(base),
                None => return Err(format!("unexpected '{}' in '{}'", c, self.descriptor)),
            },
            None => return Err(format!("'{}' ends where a type was expected", self.descriptor)),
        };
        match dimensions {
            0 => Ok(element),
            1..=255 => Ok(FieldType::Array {
                dimensions: dimensions as u8,
                element: Box::new(element),
            }),
            _ => Err(format!("'{}' has more than 255 array dimensions", self.descriptor)),
        }
    }

    fn finish(&self) -> Result<(), String> {
        if self.rest.is_empty() {
            Ok(())
        } else {
            Err(format!("leftover '{}' in '{}'", self.rest, self.descriptor))
        }
    }
}
