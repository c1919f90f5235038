use console::Style;
use montebrick_core::config::SimConfig;
use montebrick_core::orchestrator::{RunOutcome, RunSummary};

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

fn print_rule(s: &Styles, title: &str) {
    println!("  {}", s.title.apply_to(title));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(title.chars().count())));
    println!();
}

pub fn print_run_summary(config: &SimConfig) {
    let s = Styles::new();

    println!();
    print_rule(&s, "Montebrick Injection Pass");

    println!(
        "  {:<14}{}",
        s.label.apply_to("Brick"),
        s.value.apply_to(&config.brickname)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Pass"),
        s.value.apply_to(config.simid())
    );
    match config.injected_fn {
        Some(ref path) => println!(
            "  {:<14}{}",
            s.label.apply_to("Candidates"),
            s.path.apply_to(path.display())
        ),
        None => println!(
            "  {:<14}{}",
            s.label.apply_to("Candidates"),
            s.disabled.apply_to("none")
        ),
    }
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(config.output_dir.display())
    );
    println!();

    // Selection
    let sel = &config.selection;
    println!("  {}", s.header.apply_to("Selection"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Rows"),
        s.value.apply_to(match sel.nobj {
            Some(nobj) => format!("{}..{}", sel.rowstart, sel.rowstart + nobj),
            None => format!("{}..", sel.rowstart),
        })
    );
    if sel.col_radius_arcsec > 0.0 {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Collisions"),
            s.value.apply_to(format!("{}\"", sel.col_radius_arcsec))
        );
    } else {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Collisions"),
            s.disabled.apply_to("disabled")
        );
    }
    if let Some(seed) = sel.seed {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Seed"),
            s.value.apply_to(seed)
        );
    }
    println!();

    // Injection
    let inj = &config.injection;
    println!("  {}", s.header.apply_to("Injection"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Renderer"),
        s.method.apply_to(inj.strategy)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Noise"),
        s.method.apply_to(inj.noise)
    );
    if inj.image_eq_model {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Image"),
            s.value.apply_to("model only")
        );
    }
    println!(
        "    {:<12}{}",
        s.label.apply_to("Blobs"),
        if config.sim_blobs {
            s.value.apply_to("injected only")
        } else {
            s.disabled.apply_to("all")
        }
    );
    println!();
}

pub fn print_outcome(outcome: &RunOutcome) {
    let s = Styles::new();
    match outcome {
        RunOutcome::Completed(summary) => print_completed(&s, summary),
        RunOutcome::NothingToDo(reason) => {
            println!(
                "  {:<14}{}",
                s.header.apply_to("Nothing to do"),
                s.disabled.apply_to(reason)
            );
            println!();
        }
    }
}

fn print_completed(s: &Styles, summary: &RunSummary) {
    println!("  {}", s.header.apply_to("Result"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Mode"),
        s.method.apply_to(summary.kind)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Sources"),
        s.value.apply_to(summary.n_sources)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Collided"),
        s.value.apply_to(summary.n_collided)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Recovered"),
        s.value.apply_to(format!(
            "{} of {}",
            summary.n_recovered,
            summary.n_sources - summary.n_collided
        ))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Fitted"),
        s.value.apply_to(summary.n_fitted)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Injected"),
        s.path.apply_to(summary.injected_path.display())
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Tractor"),
        s.path.apply_to(summary.tractor_path.display())
    );
    println!();
}
