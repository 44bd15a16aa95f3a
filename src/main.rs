use ferris_barbershop::BarbershopError;

fn main() -> Result<(), BarbershopError> {
    ferris_barbershop::run()
}
