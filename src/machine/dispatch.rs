use crate::error::{ProgramError, SmlResult};
use crate::io::OutputSink;
use crate::program::{Instruction, Label, Opcode};

use super::{Machine, Transition};

impl Instruction {
    /// Executes this instruction against the machine's current frame.
    ///
    /// For the binary opcodes the value on top of the stack is the right
    /// operand: `push 7; push 2; sub` leaves `5`, and `if_cmpgt` jumps when
    /// the deeper value is greater than the top one.
    pub fn execute<O: OutputSink>(&self, machine: &mut Machine<O>) -> SmlResult<Transition> {
        match self.opcode() {
            Opcode::Push(value) => {
                let frame = machine.current_frame_mut()?;
                frame.push(*value);
                frame.advance()?;
            }
            Opcode::Print => {
                let frame = machine.current_frame_mut()?;
                let value = frame.pop()?;
                machine.output_mut().emit(value);
                machine.current_frame_mut()?.advance()?;
            }
            Opcode::Load(name) => {
                let frame = machine.current_frame_mut()?;
                let value = frame
                    .variable(name)?
                    .load()
                    .ok_or_else(|| ProgramError::UnsetVariable(name.to_string()))?;
                frame.push(value);
                frame.advance()?;
            }
            Opcode::Store(name) => {
                let frame = machine.current_frame_mut()?;
                let value = frame.pop()?;
                frame.variable_mut(name)?.store(value);
                frame.advance()?;
            }
            Opcode::Add => calculate(machine, checked("+", i32::checked_add))?,
            Opcode::Sub => calculate(machine, checked("-", i32::checked_sub))?,
            Opcode::Mul => calculate(machine, checked("*", i32::checked_mul))?,
            Opcode::Div => calculate(machine, |lhs, rhs| {
                if rhs == 0 {
                    return Err(ProgramError::DivideByZero);
                }
                checked("/", i32::checked_div)(lhs, rhs)
            })?,
            Opcode::IfCmpEq(label) => compare(machine, label, |lhs, rhs| lhs == rhs)?,
            Opcode::IfCmpGt(label) => compare(machine, label, |lhs, rhs| lhs > rhs)?,
            Opcode::Goto(label) => machine.current_frame_mut()?.jump_to(label)?,
            Opcode::Invoke(name) => {
                let callee = machine.new_frame_for_method_invocation(name)?;
                machine.push_frame(callee);
            }
            Opcode::Return if machine.invoker().is_none() => {
                // the outermost frame has nowhere to hand a value to
                return Ok(machine.halt());
            }
            Opcode::Return => {
                let value = machine.current_frame_mut()?.pop()?;
                return Ok(machine.return_from_current(value)?);
            }
        }
        Ok(Transition::Continue)
    }
}

/// Wraps a checked `i32` operation so that `None` becomes an overflow error.
fn checked(
    op: &'static str,
    operation: fn(i32, i32) -> Option<i32>,
) -> impl Fn(i32, i32) -> Result<i32, ProgramError> {
    move |lhs, rhs| operation(lhs, rhs).ok_or(ProgramError::Overflow { op, lhs, rhs })
}

fn calculate<O: OutputSink>(
    machine: &mut Machine<O>,
    operation: impl Fn(i32, i32) -> Result<i32, ProgramError>,
) -> SmlResult<()> {
    let frame = machine.current_frame_mut()?;
    let (lhs, rhs) = frame.pop_operands()?;
    let result = operation(lhs, rhs)?;
    frame.push(result);
    frame.advance()?;
    Ok(())
}

fn compare<O: OutputSink>(
    machine: &mut Machine<O>,
    label: &Label,
    predicate: impl Fn(i32, i32) -> bool,
) -> SmlResult<()> {
    let frame = machine.current_frame_mut()?;
    let (lhs, rhs) = frame.pop_operands()?;
    if predicate(lhs, rhs) {
        frame.jump_to(label)?;
    } else {
        frame.advance()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MachineConfig;
    use crate::error::SmlError;
    use crate::io::CollectOutput;
    use crate::program::{Method, VariableIdentifier};

    /// Machine whose `main` runs `instructions`, with `stack` pre-pushed.
    fn machine_with(instructions: Vec<Instruction>, stack: &[i32]) -> Machine<CollectOutput> {
        let main = Method::new("main".into(), Vec::new(), instructions).unwrap();
        let mut machine =
            Machine::with_output(vec![main], MachineConfig::default(), CollectOutput::new())
                .unwrap();
        let frame = machine.frame_mut().unwrap();
        for value in stack {
            frame.push(*value);
        }
        machine
    }

    fn binary(opcode: Opcode, stack: &[i32]) -> (SmlResult<Transition>, Machine<CollectOutput>) {
        let mut machine = machine_with(
            vec![Instruction::from(opcode), Instruction::from(Opcode::Return)],
            stack,
        );
        let result = machine.step();
        (result, machine)
    }

    fn top(machine: &Machine<CollectOutput>) -> &[i32] {
        machine.frame().unwrap().stack()
    }

    #[test]
    fn push_then_advance() {
        let mut machine = machine_with(
            vec![Instruction::from(Opcode::Push(-3)), Instruction::from(Opcode::Return)],
            &[],
        );
        assert_eq!(machine.step(), Ok(Transition::Continue));
        assert_eq!(top(&machine), &[-3]);
        assert_eq!(machine.frame().unwrap().program_counter(), 1);
    }

    #[test]
    fn print_emits_popped_value() {
        let mut machine = machine_with(
            vec![Instruction::from(Opcode::Print), Instruction::from(Opcode::Return)],
            &[8, 13],
        );
        machine.step().unwrap();
        assert_eq!(machine.output().values(), &[13]);
        assert_eq!(top(&machine), &[8]);
    }

    #[test]
    fn print_on_empty_stack_underflows() {
        let mut machine = machine_with(
            vec![Instruction::from(Opcode::Print), Instruction::from(Opcode::Return)],
            &[],
        );
        assert_eq!(
            machine.step(),
            Err(SmlError::Program(ProgramError::StackUnderflow))
        );
        assert!(machine.output().values().is_empty());
    }

    #[test]
    fn arithmetic_consumes_two_and_pushes_one() {
        let cases = [
            (Opcode::Add, 5),
            (Opcode::Sub, 1),
            (Opcode::Mul, 6),
            (Opcode::Div, 1),
        ];
        for (opcode, expected) in cases {
            let (result, machine) = binary(opcode.clone(), &[1000, 3, 2]);
            assert_eq!(result, Ok(Transition::Continue), "{opcode:?}");
            assert_eq!(top(&machine), &[1000, expected], "{opcode:?}");
        }
    }

    #[test]
    fn subtraction_and_division_take_top_as_right_operand() {
        let (_, machine) = binary(Opcode::Sub, &[10, 3]);
        assert_eq!(top(&machine), &[7]);
        let (_, machine) = binary(Opcode::Div, &[20, 4]);
        assert_eq!(top(&machine), &[5]);
        let (_, machine) = binary(Opcode::Div, &[-7, 2]);
        assert_eq!(top(&machine), &[-3]);
    }

    #[test]
    fn binary_underflow_leaves_stack_untouched() {
        for opcode in [Opcode::Add, Opcode::Sub, Opcode::Mul, Opcode::Div] {
            let (result, machine) = binary(opcode.clone(), &[3]);
            assert_eq!(
                result,
                Err(SmlError::Program(ProgramError::StackUnderflow)),
                "{opcode:?}"
            );
            assert_eq!(top(&machine), &[3], "{opcode:?}");
        }
        let (result, machine) = binary(Opcode::IfCmpEq("x".into()), &[]);
        assert_eq!(result, Err(SmlError::Program(ProgramError::StackUnderflow)));
        assert!(top(&machine).is_empty());
        for opcode in [Opcode::IfCmpEq("x".into()), Opcode::IfCmpGt("x".into())] {
            let (result, machine) = binary(opcode.clone(), &[6]);
            assert_eq!(
                result,
                Err(SmlError::Program(ProgramError::StackUnderflow)),
                "{opcode:?}"
            );
            assert_eq!(top(&machine), &[6], "{opcode:?}");
            assert_eq!(machine.frame().unwrap().program_counter(), 0, "{opcode:?}");
        }
    }

    #[test]
    fn overflow_is_reported_not_wrapped() {
        let cases = [
            (Opcode::Add, [i32::MAX, 1]),
            (Opcode::Sub, [i32::MIN, 1]),
            (Opcode::Mul, [i32::MAX, 2]),
            (Opcode::Div, [i32::MIN, -1]),
        ];
        for (opcode, stack) in cases {
            let (result, _) = binary(opcode.clone(), &stack);
            assert!(
                matches!(
                    result,
                    Err(SmlError::Program(ProgramError::Overflow { lhs, rhs, .. }))
                        if lhs == stack[0] && rhs == stack[1]
                ),
                "{opcode:?} gave {result:?}"
            );
        }
    }

    #[test]
    fn division_by_zero_fails() {
        let (result, _) = binary(Opcode::Div, &[10, 0]);
        assert_eq!(result, Err(SmlError::Program(ProgramError::DivideByZero)));
        let (result, _) = binary(Opcode::Div, &[0, 0]);
        assert_eq!(result, Err(SmlError::Program(ProgramError::DivideByZero)));
    }

    fn branching(opcode: Opcode, stack: &[i32]) -> Machine<CollectOutput> {
        let mut machine = machine_with(
            vec![
                Instruction::from(opcode),
                Instruction::from(Opcode::Return),
                Instruction::labelled("target", Opcode::Return),
            ],
            stack,
        );
        machine.step().unwrap();
        machine
    }

    #[test]
    fn compare_equal_jumps_only_when_equal() {
        let taken = branching(Opcode::IfCmpEq("target".into()), &[4, 4]);
        assert_eq!(taken.frame().unwrap().program_counter(), 2);
        let fallthrough = branching(Opcode::IfCmpEq("target".into()), &[4, 5]);
        assert_eq!(fallthrough.frame().unwrap().program_counter(), 1);
        assert!(top(&fallthrough).is_empty());
    }

    #[test]
    fn compare_greater_uses_deeper_value_as_left_operand() {
        let taken = branching(Opcode::IfCmpGt("target".into()), &[9, 2]);
        assert_eq!(taken.frame().unwrap().program_counter(), 2);
        let fallthrough = branching(Opcode::IfCmpGt("target".into()), &[2, 9]);
        assert_eq!(fallthrough.frame().unwrap().program_counter(), 1);
        let equal = branching(Opcode::IfCmpGt("target".into()), &[5, 5]);
        assert_eq!(equal.frame().unwrap().program_counter(), 1);
    }

    #[test]
    fn goto_jumps_without_touching_stack() {
        let machine = branching(Opcode::Goto("target".into()), &[1]);
        assert_eq!(machine.frame().unwrap().program_counter(), 2);
        assert_eq!(top(&machine), &[1]);
    }

    #[test]
    fn branch_to_missing_label_names_label_and_method() {
        for opcode in [
            Opcode::Goto("nowhere".into()),
            Opcode::IfCmpEq("nowhere".into()),
            Opcode::IfCmpGt("nowhere".into()),
        ] {
            let (result, _) = binary(opcode.clone(), &[1, 1]);
            let expected = ProgramError::LabelNotFound {
                label: "nowhere".into(),
                method: "main".into(),
            };
            // if_cmpgt falls through on 1 > 1 and never resolves the label
            if matches!(opcode, Opcode::IfCmpGt(_)) {
                assert_eq!(result, Ok(Transition::Continue));
            } else {
                assert_eq!(result, Err(SmlError::Program(expected)), "{opcode:?}");
            }
        }
        let (result, _) = binary(Opcode::IfCmpGt("nowhere".into()), &[2, 1]);
        assert!(matches!(
            result,
            Err(SmlError::Program(ProgramError::LabelNotFound { .. }))
        ));
    }

    #[test]
    fn store_then_load_round_trips_through_a_cell() {
        let mut machine = machine_with(
            vec![
                Instruction::from(Opcode::Store("x".into())),
                Instruction::from(Opcode::Load("x".into())),
                Instruction::from(Opcode::Load("x".into())),
                Instruction::from(Opcode::Return),
            ],
            &[21],
        );
        machine.step().unwrap();
        assert!(top(&machine).is_empty());
        assert_eq!(
            machine.frame().unwrap().variable(&"x".into()).unwrap().load(),
            Some(21)
        );
        machine.step().unwrap();
        machine.step().unwrap();
        assert_eq!(top(&machine), &[21, 21]);
    }

    #[test]
    fn loading_an_unset_variable_fails() {
        let mut machine = machine_with(
            vec![
                Instruction::from(Opcode::Load("x".into())),
                Instruction::from(Opcode::Return),
            ],
            &[],
        );
        assert_eq!(
            machine.step(),
            Err(SmlError::Program(ProgramError::UnsetVariable("x".into())))
        );
    }

    #[test]
    fn store_on_empty_stack_underflows() {
        let (result, _) = binary(Opcode::Store("x".into()), &[]);
        assert_eq!(result, Err(SmlError::Program(ProgramError::StackUnderflow)));
    }

    #[test]
    fn store_writes_argument_cell() {
        let callee = Method::new(
            "f".into(),
            vec![VariableIdentifier::new("n")],
            vec![
                Instruction::from(Opcode::Store("n".into())),
                Instruction::from(Opcode::Return),
            ],
        )
        .unwrap();
        let main = Method::new(
            "main".into(),
            Vec::new(),
            vec![
                Instruction::from(Opcode::Push(1)),
                Instruction::from(Opcode::Invoke("f".into())),
                Instruction::from(Opcode::Return),
            ],
        )
        .unwrap();
        let mut machine =
            Machine::with_output(vec![main, callee], MachineConfig::default(), CollectOutput::new())
                .unwrap();
        machine.step().unwrap();
        machine.step().unwrap();
        machine.frame_mut().unwrap().push(99);
        machine.step().unwrap();
        let frame = machine.frame().unwrap();
        assert_eq!(frame.variable(&"n".into()).unwrap().load(), Some(99));
        assert_eq!(frame.arguments()[0].load(), Some(99));
    }

    #[test]
    fn invoke_pushes_callee_and_keeps_caller_counter() {
        let callee = Method::new(
            "f".into(),
            vec![VariableIdentifier::new("a"), VariableIdentifier::new("b")],
            vec![Instruction::from(Opcode::Return)],
        )
        .unwrap();
        let main = Method::new(
            "main".into(),
            Vec::new(),
            vec![
                Instruction::from(Opcode::Invoke("@f".into())),
                Instruction::from(Opcode::Return),
            ],
        )
        .unwrap();
        let mut machine =
            Machine::with_output(vec![main, callee], MachineConfig::default(), CollectOutput::new())
                .unwrap();
        let caller = machine.frame_mut().unwrap();
        caller.push(1);
        caller.push(2);
        caller.push(3);
        machine.step().unwrap();
        assert_eq!(machine.call_depth(), 2);
        let frame = machine.frame().unwrap();
        assert_eq!(frame.method().name().name(), "f");
        assert_eq!(frame.variable(&"a".into()).unwrap().load(), Some(3));
        assert_eq!(frame.variable(&"b".into()).unwrap().load(), Some(2));
        let invoker = machine.invoker().unwrap();
        assert_eq!(invoker.program_counter(), 0);
        assert_eq!(invoker.stack(), &[1]);
    }

    #[test]
    fn invoke_unknown_method_fails() {
        let (result, _) = binary(Opcode::Invoke("missing".into()), &[]);
        assert_eq!(
            result,
            Err(SmlError::Program(ProgramError::MethodNotFound("missing".into())))
        );
    }

    #[test]
    fn return_on_outermost_frame_halts() {
        let (result, machine) = binary(Opcode::Return, &[7]);
        assert_eq!(result, Ok(Transition::Halt));
        assert!(machine.is_halted());
    }

    #[test]
    fn outermost_return_halts_on_empty_stack() {
        let (result, machine) = binary(Opcode::Return, &[]);
        assert_eq!(result, Ok(Transition::Halt));
        assert!(machine.is_halted());
    }

    #[test]
    fn nested_return_without_value_underflows() {
        let callee = Method::new(
            "f".into(),
            Vec::new(),
            vec![Instruction::from(Opcode::Return)],
        )
        .unwrap();
        let main = Method::new(
            "main".into(),
            Vec::new(),
            vec![
                Instruction::from(Opcode::Invoke("f".into())),
                Instruction::from(Opcode::Return),
            ],
        )
        .unwrap();
        let mut machine =
            Machine::with_output(vec![main, callee], MachineConfig::default(), CollectOutput::new())
                .unwrap();
        machine.step().unwrap();
        assert_eq!(
            machine.step(),
            Err(SmlError::Program(ProgramError::StackUnderflow))
        );
        assert_eq!(machine.call_depth(), 2);
    }

    #[test]
    fn print_as_last_instruction_still_emits() {
        let mut machine = machine_with(vec![Instruction::from(Opcode::Print)], &[5]);
        assert_eq!(
            machine.step(),
            Err(SmlError::Program(ProgramError::ProgramCounterOutOfBounds {
                method: "main".into(),
                pc: 1
            }))
        );
        assert_eq!(machine.output().values(), &[5]);
    }
}
