use criterion::{Criterion, black_box, criterion_group, criterion_main};

use riscv_hart::{
    Hart, HartConfig, Ram, isa::riscv::observer::InstructionLimit, ram_config::BASE_ADDR,
};

const COUNTDOWN: [u32; 4] = [
    0x3e80_0093, // addi x1, x0, 1000
    0xfff0_8093, // addi x1, x1, -1
    0xfe00_9ee3, // bne x1, x0, -4
    0x1050_0073, // wfi
];

fn countdown_hart(isa: &str, observed: bool) -> Hart {
    let mut ram = Ram::new(BASE_ADDR, 0x1000);
    ram.write_program(BASE_ADDR, &COUNTDOWN).unwrap();
    let mut hart = Hart::new(HartConfig::new().with_isa(isa), Box::new(ram)).unwrap();
    if observed {
        hart.add_observer(Box::new(InstructionLimit::new(u64::MAX)))
            .unwrap();
    }
    hart.boot().unwrap();
    hart
}

fn bench_hart_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("hart_run");
    group.sample_size(50);

    for (name, isa, observed) in [
        ("countdown_rv64", "rv64gc", false),
        ("countdown_rv32", "rv32imac_zicsr", false),
        ("countdown_rv64_observed", "rv64gc", true),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut hart = countdown_hart(isa, observed);
                hart.run().unwrap();
                black_box(hart.inst_count());
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_hart_run);
criterion_main!(benches);
