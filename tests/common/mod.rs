use jvmpatch::jvm::class_file::{
    self, BytecodeArray, BytecodeIndex, ClassFile, Code, ExceptionHandler, LocalVariable,
    LocalVariableTable, StackMapFrame, StackMapTable,
};
use jvmpatch::jvm::code::MethodBody;
use jvmpatch::jvm::model::CompiledType;
use jvmpatch::jvm::{
    ClassAccessFlags, ClassConstantIndex, Constant, ConstantIndex, ConstantsPool,
    MethodAccessFlags, Utf8ConstantIndex, Version,
};

/// Method to put in a [`ClassBuilder`], with its code already assembled
pub struct MethodSpec<'a> {
    pub name: &'a str,
    pub descriptor: &'a str,
    pub access_flags: MethodAccessFlags,
    pub code: Vec<u8>,
    pub max_stack: u16,
    pub max_locals: u16,

    /// Slot, name, and descriptor of locals in scope over the whole method (`None` for no table)
    pub locals: Option<Vec<(u16, &'a str, &'a str)>>,
    pub frames: Option<Vec<StackMapFrame<ClassConstantIndex, u16>>>,
    pub handlers: Vec<ExceptionHandler>,
}

impl<'a> MethodSpec<'a> {
    pub fn new(name: &'a str, descriptor: &'a str, code: Vec<u8>) -> MethodSpec<'a> {
        MethodSpec {
            name,
            descriptor,
            access_flags: MethodAccessFlags::PUBLIC,
            code,
            max_stack: 4,
            max_locals: 4,
            locals: None,
            frames: None,
            handlers: vec![],
        }
    }

    pub fn locals(mut self, locals: Vec<(u16, &'a str, &'a str)>) -> MethodSpec<'a> {
        self.locals = Some(locals);
        self
    }

    pub fn frames(mut self, frames: Vec<StackMapFrame<ClassConstantIndex, u16>>) -> MethodSpec<'a> {
        self.frames = Some(frames);
        self
    }

    /// Add an exception table entry (offsets are in bytes)
    pub fn handler(
        mut self,
        start: u16,
        end: u16,
        handler: u16,
        catch_type: ClassConstantIndex,
    ) -> MethodSpec<'a> {
        self.handlers.push(ExceptionHandler {
            start_pc: BytecodeIndex(start),
            end_pc: BytecodeIndex(end),
            handler_pc: BytecodeIndex(handler),
            catch_type,
        });
        self
    }

    pub fn access_flags(mut self, access_flags: MethodAccessFlags) -> MethodSpec<'a> {
        self.access_flags = access_flags;
        self
    }
}

/// Assemble small class files to patch
pub struct ClassBuilder {
    pub constants: ConstantsPool,
    pub version: Version,
    this_class: ClassConstantIndex,
    super_class: ClassConstantIndex,
    methods: Vec<class_file::Method>,
}

impl ClassBuilder {
    pub fn new(name: &str) -> ClassBuilder {
        let mut constants = ConstantsPool::new();
        let this_class = constants.get_class(name).unwrap();
        let super_class = constants.get_class("java/lang/Object").unwrap();
        ClassBuilder {
            constants,
            version: Version::JAVA8,
            this_class,
            super_class,
            methods: vec![],
        }
    }

    /// Add a `Fieldref` constant
    pub fn field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> ConstantIndex {
        let class = self.constants.get_class(class).unwrap();
        let name = self.constants.get_utf8(name).unwrap();
        let descriptor = self.constants.get_utf8(descriptor).unwrap();
        let name_and_type = self.constants.get_name_and_type(name, descriptor).unwrap();
        self.constants
            .push_constant(Constant::FieldRef(class, name_and_type))
            .unwrap()
    }

    /// Add a `String` constant whose text is given as raw modified UTF-8
    pub fn raw_string(&mut self, bytes: &[u8]) -> ConstantIndex {
        let text = self
            .constants
            .push_constant(Constant::OpaqueUtf8(bytes.to_vec()))
            .unwrap();
        self.constants
            .push_constant(Constant::String(Utf8ConstantIndex(text)))
            .unwrap()
    }

    pub fn method(&mut self, method: MethodSpec<'_>) -> &mut ClassBuilder {
        let mut code = Code {
            max_stack: method.max_stack,
            max_locals: method.max_locals,
            code_array: BytecodeArray(method.code.clone()),
            exception_table: method.handlers.clone(),
            attributes: vec![],
        };

        if let Some(locals) = &method.locals {
            let mut table = vec![];
            for (slot, name, descriptor) in locals {
                table.push(LocalVariable {
                    start_pc: BytecodeIndex(0),
                    length: method.code.len() as u16,
                    name_index: self.constants.get_utf8(name).unwrap(),
                    descriptor_index: self.constants.get_utf8(descriptor).unwrap(),
                    index: *slot,
                });
            }
            let table = LocalVariableTable(table);
            code.attributes
                .push(self.constants.get_attribute(&table).unwrap());
        }
        if let Some(frames) = method.frames {
            let table = StackMapTable(frames);
            code.attributes
                .push(self.constants.get_attribute(&table).unwrap());
        }

        let code = self.constants.get_attribute(&code).unwrap();
        self.methods.push(class_file::Method {
            access_flags: method.access_flags,
            name_index: self.constants.get_utf8(method.name).unwrap(),
            descriptor_index: self.constants.get_utf8(method.descriptor).unwrap(),
            attributes: vec![code],
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        ClassFile {
            version: self.version,
            constants: self.constants.clone(),
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            this_class: self.this_class,
            super_class: self.super_class,
            interfaces: vec![],
            fields: vec![],
            methods: self.methods.clone(),
            attributes: vec![],
        }
        .to_bytes()
        .unwrap()
    }
}

/// Decoded body of the first method with this name
pub fn method_body(bytes: &[u8], name: &str) -> MethodBody {
    let class = CompiledType::parse(bytes).unwrap();
    let method = class
        .methods
        .iter()
        .find(|method| method.name == name)
        .unwrap_or_else(|| panic!("no method {}", name));
    method.body.clone().unwrap()
}

/// Raw `Code` attribute of the first method with this name
pub fn raw_code(bytes: &[u8], name: &str) -> Code {
    let class = ClassFile::parse(bytes).unwrap();
    let method = class
        .methods
        .iter()
        .find(|method| class.constants.utf8(method.name_index).unwrap() == name)
        .unwrap_or_else(|| panic!("no method {}", name));
    let code = method
        .attributes
        .iter()
        .find(|attribute| attribute.name(&class.constants).unwrap() == "Code")
        .unwrap();
    code.decode::<Code>().unwrap()
}

/// `StackMapTable` of the first method with this name, if it has one
pub fn stack_map_table(bytes: &[u8], name: &str) -> Option<StackMapTable> {
    let class = ClassFile::parse(bytes).unwrap();
    let code = raw_code(bytes, name);
    code.attributes
        .iter()
        .find(|attribute| attribute.name(&class.constants).unwrap() == "StackMapTable")
        .map(|attribute| attribute.decode::<StackMapTable>().unwrap())
}

/// Big-endian bytes of a constant index, for splicing into hand-assembled code
pub fn index_bytes(index: ConstantIndex) -> [u8; 2] {
    index.0.to_be_bytes()
}
