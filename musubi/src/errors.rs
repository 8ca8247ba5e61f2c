use crate::object::ObjectId;

error_chain! {
    errors {
        ParseError(reason: String) {
            description("malformed function code")
            display("failed to parse function: {}", reason)
        }
        UnassignedVariable(name: String) {
            description("variable has not been assigned")
            display("variable `{}` has no qualifier, type or value", name)
        }
        UnboundTemplateVariable(function: String, var: String) {
            description("template variable is not bound")
            display("template variable `${}` of `{}` is not bound to any object", var, function)
        }
        UnknownTemplateVariable(function: String, var: String) {
            description("unknown template variable")
            display("`{}` has no template variable `${}`", function, var)
        }
        AlreadyBound(function: String, var: String, current: ObjectId) {
            description("template variable is already bound")
            display("template variable `${}` of `{}` is already bound to {}", var, function, current)
        }
        NameCollision(name: String, first: ObjectId, second: ObjectId) {
            description("name collision")
            display("name `{}` is claimed by both {} and {}", name, first, second)
        }
        ReservedName(name: String) {
            description("reserved name")
            display("`{}` is a reserved GLSL name", name)
        }
        RequiredNameMismatch(declared: String, required: String) {
            description("fixed name does not match the required name")
            display("`{}` cannot be renamed to `{}`", declared, required)
        }
        ChainTypeMismatch(chain: String, from: String, from_type: String, to: String, to_types: String) {
            description("chained functions do not thread")
            display("chain `{}` cannot feed `{}` ({}) into `{}` ({})", chain, from, from_type, to, to_types)
        }
        TypeMismatch(name: String, expected: String, found: String) {
            description("value does not match the variable type")
            display("variable `{}` is `{}`, cannot assign a `{}` value", name, expected, found)
        }
        VaryingValue(name: String) {
            description("varyings cannot hold values")
            display("cannot assign a value to varying `{}`", name)
        }
        UnknownObject(id: ObjectId) {
            description("unknown shader object")
            display("no shader object {}", id)
        }
        Unnamed(id: ObjectId) {
            description("shader object has no name")
            display("shader object {} has not been assigned a name", id)
        }
        NotAFunction(id: ObjectId) {
            description("object is not a function")
            display("shader object {} is not a function", id)
        }
        NotAVariable(id: ObjectId) {
            description("object is not a variable")
            display("shader object {} is not a variable", id)
        }
        NotAChain(id: ObjectId) {
            description("object is not a function chain")
            display("shader object {} is not a function chain", id)
        }
        MemberOutOfRange(chain: ObjectId, index: usize) {
            description("chain member index out of range")
            display("chain {} has no member at index {}", chain, index)
        }
        CallArity(function: String, expected: usize, found: usize) {
            description("wrong number of call arguments")
            display("`{}` takes {} arguments, called with {}", function, expected, found)
        }
        InvalidPostHook(target: String) {
            description("invalid assignment target")
            display("`{}` cannot be assigned at the end of main", target)
        }
        CyclicDependency(id: ObjectId) {
            description("dependency graph is cyclic")
            display("shader object {} depends on itself", id)
        }
    }
}
