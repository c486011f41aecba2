use cmm::console::ScriptedConsole;
use cmm::error::Diagnostics;
use cmm::interpreter::Interpreter;
use cmm::session::{Event, Session};
use cmm::symbol_table::Value;
use cmm::token::render_tokens;
use cmm::{RunOutcome, analyze_and_run, lex, parse, run_source};

fn run_scripted(src: &str, input: &[&str]) -> (ScriptedConsole, Diagnostics) {
    let mut console = ScriptedConsole::with_input(input.iter().copied());
    match run_source(src, &mut console) {
        RunOutcome::Completed { semantic } => (console, semantic),
        RunOutcome::Rejected { lexical, syntax } => panic!(
            "program was rejected:\n{}{}\n{src}",
            lexical.text(),
            syntax.text()
        ),
    }
}

fn assert_output(src: &str, expected: &[&str]) {
    let (console, semantic) = run_scripted(src, &[]);
    assert!(semantic.is_empty(), "unexpected errors:\n{}", semantic.text());
    assert_eq!(console.output(), expected, "program:\n{src}");
}

fn assert_semantic_failure(src: &str, message: &str) -> Vec<String> {
    let (console, semantic) = run_scripted(src, &[]);
    assert_eq!(semantic.count(), 1, "expected one error for:\n{src}\ngot:\n{}", semantic.text());
    assert_eq!(semantic.entries()[0].message, message);
    console.output().to_vec()
}

#[test]
fn declared_value_is_written() {
    assert_output("int x = 5; write x;", &["5"]);
}

#[test]
fn uninitialized_read_is_one_error_without_output() {
    let output = assert_semantic_failure("int x; write x;", "variable x is uninitialized");
    assert!(output.is_empty());
}

#[test]
fn out_of_range_index_leaves_earlier_assignment() {
    let lexed = lex("int a[3]; a[0] = 1; a[5] = 2;");
    let parsed = parse(&lexed.tokens);
    assert!(lexed.diagnostics.is_empty() && parsed.diagnostics.is_empty());

    let mut console = ScriptedConsole::new();
    let mut interpreter = Interpreter::new(&mut console);
    let semantic = interpreter.evaluate_program(&parsed.tree);
    assert_eq!(semantic.count(), 1);
    assert!(semantic.entries()[0].message.contains("index out of range"));
    let first = interpreter
        .symbols()
        .iter()
        .find(|symbol| symbol.name == "a@0")
        .and_then(|symbol| symbol.value.clone());
    assert_eq!(first, Some(Value::Int(1)));
}

#[test]
fn int_widens_to_real_but_real_does_not_narrow() {
    assert_output("real r = 1; write r;", &["1.0"]);
    assert_semantic_failure("int i = 1.5;", "cannot assign float to int variable");
}

#[test]
fn division_by_zero_is_one_error_without_output() {
    let output = assert_semantic_failure("write 4/0;", "division by zero");
    assert!(output.is_empty());
}

#[test]
fn while_locals_do_not_outlive_the_loop() {
    let output = assert_semantic_failure(
        "int i = 0;\nwhile (i < 2) {\n  int local = i;\n  i = i + 1;\n}\nwrite local;",
        "variable local is undeclared",
    );
    assert!(output.is_empty());
}

// The change clause is evaluated after the body's declarations are evicted
// and cannot see them.
#[test]
fn for_change_does_not_see_body_locals() {
    let output = assert_semantic_failure(
        "int i; for (i = 0; i < 5; i = i + step) { int step = 2; write i; }",
        "variable step is undeclared",
    );
    assert_eq!(output, ["0"]);
}

#[test]
fn a_complete_program_runs() {
    let src = "\
/* sum and maximum of an array */
int data[5];
int i;
for (i = 0; i < 5; i = i + 1) {
    data[i] = (i * 7) - (i * i);
}
int sum = 0;
int max = data[0];
i = 0;
while (i < 5) {
    sum = sum + data[i];
    if (data[i] > max) max = data[i]; // keep the largest
    i = i + 1;
}
write sum;
write max;
real mean = sum / 5.0;
write mean;
bool positive = sum;
write positive;
string label = \"done\";
write label;
";
    assert_output(src, &["40", "12", "8.0", "true", "done"]);
}

#[test]
fn lexical_and_syntax_errors_block_execution() {
    let mut console = ScriptedConsole::new();
    match run_source("int 12x;\nwrite 1;\nwrite 2", &mut console) {
        RunOutcome::Rejected { lexical, syntax } => {
            assert_eq!(lexical.count(), 1);
            assert_eq!(syntax.count(), 2, "{}", syntax.text());
        }
        RunOutcome::Completed { .. } => panic!("program with errors was run"),
    }
    assert!(console.output().is_empty());
}

#[test]
fn stray_symbol_after_a_numeral_blocks_execution() {
    let mut console = ScriptedConsole::new();
    match run_source("int x = 3$;\nwrite x;", &mut console) {
        RunOutcome::Rejected { lexical, syntax } => {
            assert_eq!(
                lexical.text(),
                "ERROR: line 1, column 10: \"$\" is an unrecognized symbol\n"
            );
            assert!(syntax.is_empty());
        }
        RunOutcome::Completed { .. } => panic!("program with a lexical error was run"),
    }
    assert!(console.output().is_empty());
}

#[test]
fn error_text_uses_the_report_formats() {
    let lexed = lex("int a = 1;\nint b = a $ 2;");
    assert_eq!(
        lexed.diagnostics.text(),
        "ERROR: line 2, column 11: \"$\" is an unrecognized symbol\n"
    );

    let (_, semantic) = run_scripted("int a;\n\nwrite a + 1;", &[]);
    assert_eq!(semantic.text(), "ERROR: line 3: variable a is uninitialized\n");
}

#[test]
fn scripted_reads_accept_and_reject() {
    let (console, semantic) = run_scripted(
        "int n;\nread n;\nread n;\nwrite n * 2;\nreal r;\nread r;\nwrite r;",
        &["12", "twelve", "3"],
    );
    assert!(semantic.is_empty(), "{}", semantic.text());
    assert_eq!(console.output(), ["24", "3.0"]);
    assert_eq!(console.rejections(), ["cannot assign \"twelve\" to variable n"]);
}

#[test]
fn session_blocks_read_until_answered() {
    let lexed = lex("int n;\nread n;\nwrite n + 1;\nbool b;\nread b;\nwrite b;");
    let parsed = parse(&lexed.tokens);
    assert!(parsed.diagnostics.is_empty());

    let session = Session::spawn(parsed.tree).unwrap();
    let mut events = Vec::new();
    while let Some(event) = session.next_event() {
        match &event {
            Event::InputRequested { target } if target == "n" => session.answer("41"),
            Event::InputRequested { .. } => session.answer("maybe"),
            _ => {}
        }
        events.push(event);
    }
    let semantic = session.join().unwrap();

    assert_eq!(
        events,
        [
            Event::InputRequested { target: "n".to_string() },
            Event::Output("42".to_string()),
            Event::InputRequested { target: "b".to_string() },
            Event::InputRejected("cannot assign \"maybe\" to variable b".to_string()),
        ]
    );
    assert_eq!(semantic.text(), "ERROR: line 6: variable b is uninitialized\n");
}

#[test]
fn rendered_program_lexes_to_the_same_tokens() {
    let src = "int a[2];\na[0] = 0;\nreal x = -0.5;\n  while (a[0] <> 3) { a[0] = a[0] + 1; }\nwrite \"end\";";
    let first = lex(src);
    assert!(first.diagnostics.is_empty());
    let rendered = render_tokens(&first.tokens);
    assert_eq!(lex(&rendered).tokens, first.tokens);

    let parsed = parse(&first.tokens);
    let reparsed = parse(&lex(&rendered).tokens);
    assert_eq!(parsed.tree, reparsed.tree);
    let mut console = ScriptedConsole::new();
    assert!(analyze_and_run(&reparsed.tree, &mut console).is_empty());
    assert_eq!(console.output(), ["end"]);
}
