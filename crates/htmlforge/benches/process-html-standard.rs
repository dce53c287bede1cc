use htmlforge::events::Handlers;
use htmlforge::{format, parse, HtmlFormatOptions, ParserOptions};

fn main() {
    divan::main();
}

/// A representative, moderately nested document: headings, a table, a
/// list, and a raw-text `<script>` block, repeated to give the tokenizer
/// and formatter enough work to produce a stable measurement.
fn sample_document() -> String {
    let unit = r#"<section class="post">
  <h2>Sample heading &amp; subtitle</h2>
  <p>Some <b>bold <i>and italic</i></b> text with an entity &mdash; here.</p>
  <table>
    <tr><th>Name</th><th>Count</th></tr>
    <tr><td>alpha</td><td>1</td></tr>
    <tr><td>beta</td><td>2</td></tr>
  </table>
  <ul><li>one<li>two<li>three</ul>
  <script>var x = 1 < 2 && 3 > 1;</script>
</section>
"#;
    unit.repeat(200)
}

#[divan::bench]
fn bench_parse(bencher: divan::Bencher) {
    let input = sample_document();
    bencher.bench(|| {
        let (_dom, results) = parse(ParserOptions::default(), Handlers::new(), &input);
        results.errors
    });
}

#[divan::bench]
fn bench_parse_and_format(bencher: divan::Bencher) {
    let input = sample_document();
    bencher.bench(|| {
        let (mut dom, _results) = parse(ParserOptions::default(), Handlers::new(), &input);
        format(&mut dom, &HtmlFormatOptions::default());
        dom.serialize(htmlforge::dom::ROOT)
    });
}
