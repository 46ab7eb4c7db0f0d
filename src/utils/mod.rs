/*
 * Kernel Utilities and Support Functions
 *
 * Support infrastructure used throughout the kernel that isn't itself
 * thread/scheduling/sync logic.
 *
 * Key components:
 * - logger: Structured logging system for kernel messages
 */

pub mod logger;
