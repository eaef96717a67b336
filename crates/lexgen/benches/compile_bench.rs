use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use lexgen::rules::{MODE_MAIN, RuleSet};
use lexgen::{automaton, compile};

const RULES: &str = "\
if: if
else: else
while: while
return: return
ident: \\l(\\l|\\d|_)*
num: \\d+
hex: 0x\\x+
float: \\d+.\\d+
plus: \\+
minus: -
star: \\*
arrow_op: =>
le: <=
ge: >=
ws \\%: [ \t]
str_start: \"
str.str_end: \"
str.esc: \\\\[nt\"]
str.chunk: [^\"\\\\]
str_start -> str
str.str_end -> main
";

fn bench_full_compile(c: &mut Criterion) {
    c.bench_function("compile_rule_set", |b| {
        b.iter(|| compile(black_box(RULES)).unwrap());
    });
}

fn bench_stages(c: &mut Criterion) {
    c.bench_function("parse_rule_set", |b| {
        b.iter(|| RuleSet::parse(black_box(RULES)).unwrap());
    });

    let set = RuleSet::parse(RULES).unwrap();
    let main_rules = set.mode(MODE_MAIN).unwrap();
    c.bench_function("build_nfa", |b| {
        b.iter(|| automaton::build_nfa(MODE_MAIN, black_box(main_rules)));
    });

    let nfa = automaton::build_nfa(MODE_MAIN, main_rules);
    c.bench_function("subset_construction", |b| {
        b.iter(|| automaton::construct(MODE_MAIN, black_box(&nfa)).unwrap());
    });

    let dfa = automaton::construct(MODE_MAIN, &nfa).unwrap();
    c.bench_function("minimize", |b| {
        b.iter(|| automaton::minimize(black_box(&dfa)).unwrap());
    });
}

criterion_group!(benches, bench_full_compile, bench_stages);
criterion_main!(benches);
