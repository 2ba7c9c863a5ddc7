use gryph::{Layout, Library, Loader};

fn main() {
    let mut args = std::env::args();
    let path = args.nth(1).expect("usage: gryph <font> [code-hex]");
    let code = args
        .next()
        .map(|arg| u16::from_str_radix(arg.trim_start_matches("0x"), 16).expect("bad code point"));

    let library = Library::new();
    let loader = Loader::new(&library, &path).expect("unrecognized font");

    println!("{path}: {} glyphs, height {}", loader.count(), loader.height());

    if let Some(code) = code {
        let height = loader.height().max(16);
        let mut layout = Layout::new(loader, height, 8, false, false).expect("layout");
        let bitmap = layout.load_char(code).expect("glyph not found");
        for y in 0..bitmap.height as usize {
            let row = &bitmap.buffer[y * bitmap.pitch as usize..][..bitmap.width as usize];
            let line: String = row
                .iter()
                .map(|&p| match p {
                    0 => ' ',
                    1..=84 => '.',
                    85..=170 => '+',
                    _ => '#',
                })
                .collect();
            println!("|{line}|");
        }
    }
}
