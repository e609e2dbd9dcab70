use color_print::cprintln;
use emu::{Image, SymbolMap};

/// Print the instruction listing grouped by function.
pub fn listing(image: &Image) {
    println!("+-[Inst]-+------------------------------------------------------------------------");
    for (addr, inst) in image.instructions.iter().enumerate() {
        if let Some((name, entry)) = image.symbols.code.iter().find(|(_, e)| e.addr == addr) {
            cprintln!("+--------+ <green>{}</green> : {}", name, signature(entry));
        }
        match &inst.origin {
            Some(origin) => cprintln!("| {:>6} : {:<48} <s>{}</>", addr, inst.cformat(), origin),
            None => cprintln!("| {:>6} : {}", addr, inst.cformat()),
        }
    }
    println!("+--------+");
    data(&image.symbols, &image.globals);
}

fn signature(entry: &emu::CodeEntry) -> String {
    let params: Vec<String> = entry
        .frame
        .values()
        .filter(|slot| slot.offset < 0)
        .map(|slot| slot.ty.to_string())
        .collect();
    format!("({}) -> {}", params.join(", "), entry.ret)
}

fn data(symbols: &SymbolMap, globals: &[arch::Value]) {
    if symbols.data.is_empty() {
        return;
    }
    println!("+-[Data]-+------------------------------------------------------------------------");
    for (name, entry) in &symbols.data {
        let len = entry.length.unwrap_or(1);
        let values: Vec<String> = globals
            .iter()
            .skip(entry.offset)
            .take(len)
            .map(|v| v.to_string())
            .collect();
        cprintln!(
            "| GBP+{:<3} : <blue>{}</blue> {} = [{}]",
            entry.offset,
            entry.ty,
            name,
            values.join(", ")
        );
    }
    println!("+--------+");
}

/// Print the frame layout of every function.
pub fn symbols(symbols: &SymbolMap) {
    for (name, entry) in &symbols.code {
        cprintln!("<green>{}</green> @ {} (+{})", name, entry.addr, entry.size);
        for (key, slot) in &entry.frame {
            match slot.length {
                Some(len) => println!("  EBP{:+} {}[{}] {}", slot.offset, slot.ty, len, key),
                None => println!("  EBP{:+} {} {}", slot.offset, slot.ty, key),
            }
        }
    }
}
