use crate::jvm::model::CompiledType;
use log::trace;

/// Find the position of a method in the method table
///
/// Both the name and the descriptor must match exactly, so overloads are told apart.
pub fn find_method(class: &CompiledType, name: &str, descriptor: &str) -> Option<usize> {
    let found = class
        .methods
        .iter()
        .position(|method| method.name == name && method.descriptor == descriptor);
    trace!("looking for {}{} in {}: {:?}", name, descriptor, class.name, found);
    found
}
